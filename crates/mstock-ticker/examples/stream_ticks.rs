/*
[INPUT]:  MSTOCK_API_KEY and MSTOCK_ACCESS_TOKEN environment variables
[OUTPUT]: Live ticks and connection events printed to stdout
[POS]:    Examples - WebSocket stream handling
[UPDATE]: When the TickerClient API changes
*/

use mstock_ticker::*;
use tokio::time::{Duration, timeout};

/// Example: stream LTP and quote ticks for a few NSE instruments
///
/// Login is sent first and the registry replay is triggered by hand, so
/// `auto_resubscribe` is turned off.
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    println!("=== mStock Ticker Example ===\n");

    let api_key = std::env::var("MSTOCK_API_KEY")?;
    let access_token = std::env::var("MSTOCK_ACCESS_TOKEN")?;
    let config = TickerConfig::new(api_key, access_token).with_auto_resubscribe(false);

    let mut client = TickerClient::new(config)?;
    let mut events = client.take_events().ok_or("event receiver already taken")?;

    client.subscribe(ExchangeSegment::NseCash, [22u32, 2885], Some(Mode::Quote))?;
    client.subscribe(ExchangeSegment::NseCash, [11536u32], None)?;
    client.connect()?;

    let run = async {
        while let Some(event) = events.recv().await {
            match event {
                TickerEvent::Connected => {
                    println!("connected");
                    client.send_login()?;
                    client.resubscribe()?;
                }
                TickerEvent::Ticks(ticks) => {
                    for tick in ticks {
                        println!(
                            "{} {} {} ltp={}",
                            tick.exchange_segment, tick.instrument_token, tick.mode, tick.last_price
                        );
                    }
                }
                TickerEvent::Error(err) if err.is_fatal() => return Err(err),
                other => println!("{other:?}"),
            }
        }
        Ok(())
    };

    // Stream for a minute, then close cleanly
    if let Ok(result) = timeout(Duration::from_secs(60), run).await {
        result?;
    }
    client.disconnect()?;
    println!("\n✓ Ticker example complete");
    Ok(())
}
