use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = searchit_api::Args::parse();

	searchit_api::run(args).await
}
