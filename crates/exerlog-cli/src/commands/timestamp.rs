use exerlog_fetch::{FetchConfig, HyperTransport, TimestampClient};

pub async fn run(config: FetchConfig, date: Option<&str>, format: &str) -> anyhow::Result<()> {
    let transport = HyperTransport::new().map_err(|e| anyhow::anyhow!(e))?;
    let client = TimestampClient::new(transport, config)?;
    let timestamp = client.lookup(date).await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&timestamp)?),
        _ => println!("{}  ({} ms)", timestamp.utc, timestamp.unix),
    }
    Ok(())
}
