use clap::Parser;

use finrag_ask::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	finrag_ask::run(args).await
}
