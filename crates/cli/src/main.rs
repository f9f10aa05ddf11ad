use std::process::ExitCode;

fn main() -> ExitCode {
    guestline_cli::run()
}
