use clap::Parser;

use milestone_worker::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	milestone_worker::run(Args::parse()).await
}
