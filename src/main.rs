#[tokio::main]
async fn main() {
    if let Err(e) = clinicrx_lib::run().await {
        eprintln!("clinicrx: {e}");
        std::process::exit(1);
    }
}
