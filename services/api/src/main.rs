use site_inspector_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("site inspector error: {err}");
        std::process::exit(1);
    }
}
