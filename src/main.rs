use std::process::ExitCode;

fn main() -> ExitCode {
    match gloss::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {}", e);
            if e.is_storage() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
