use std::process::ExitCode;

fn main() -> ExitCode {
    match cir_fit::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("cirfit: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
