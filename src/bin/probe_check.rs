use vibetodo::backend::resolver::{EndpointResolver, HttpProber, Verdict};
use vibetodo::config::TodoConfig;

#[tokio::main]
async fn main() {
    match systemd_journal_logger::JournalLog::new() {
        Ok(journal) => {
            let _ = journal
                .with_syslog_identifier("vibetodo-probe-check".to_string())
                .install();
            log::set_max_level(log::LevelFilter::Debug);
        }
        Err(e) => eprintln!("journal unavailable: {}", e),
    }

    let config = TodoConfig::load();
    let probe = &config.probe;

    println!("=== Local backend probe ===\n");
    println!(
        "Host: {}  ports: {:?}  paths: {:?}  timeout: {} ms\n",
        probe.host, probe.ports, probe.paths, probe.timeout_ms
    );

    let prober = match HttpProber::new(probe.timeout()) {
        Ok(p) => p,
        Err(e) => {
            println!("  Client error: {}", e);
            return;
        }
    };
    let resolver = EndpointResolver::new(prober, probe);

    let mut first_hit = None;
    for entry in resolver.survey().await {
        match &entry.outcome {
            Ok(Verdict::Accept) => {
                println!("  {:>5}  ACCEPT   {}", entry.port, entry.url);
                first_hit.get_or_insert(entry.port);
            }
            Ok(Verdict::Reject(reason)) => {
                println!("  {:>5}  reject   {} ({})", entry.port, entry.url, reason);
            }
            Err(e) => println!("  {:>5}  no answer  {} ({})", entry.port, entry.url, e),
        }
    }

    let Some(port) = first_hit else {
        println!("\nNothing usable is listening. Start the backend or add its port to the config.");
        return;
    };

    println!("\n--- Paths on port {} ---", port);
    match resolver.resolve().await {
        Ok(endpoint) => println!("  Resolved: {}", endpoint.url()),
        Err(e) => println!("  {}", e),
    }

    println!("\n=== Done ===");
}
