use std::process::ExitCode;

fn main() -> ExitCode {
    hcc_pipeline_lib::run()
}
