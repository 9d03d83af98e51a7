fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let command_line_interface = outshape::cli::CommandLineInterface::load();
    command_line_interface.run()
}
