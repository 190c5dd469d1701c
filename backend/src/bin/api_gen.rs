use std::fs;
use utoipa::OpenApi;

fn main() -> anyhow::Result<()> {
    let doc = nftdeck::api::ApiDoc::openapi().to_pretty_json()?;
    fs::create_dir_all("./clients")?;
    fs::write("./clients/nftdeck_openapi.json", doc)?;
    Ok(())
}
