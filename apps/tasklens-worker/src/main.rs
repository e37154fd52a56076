use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = tasklens_worker::Args::parse();

	tasklens_worker::run(args).await
}
