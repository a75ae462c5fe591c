fn main() -> std::process::ExitCode {
    swimwatch_lib::run()
}
