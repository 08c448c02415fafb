//! `helperbot serve`: Start the HTTP gateway.

use helperbot_memory::SWEEP_INTERVAL;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let orchestrator = super::build_orchestrator(&config)?;

    println!("Helperbot Gateway");
    println!("   Listening:   {}:{}", config.gateway.host, config.gateway.port);
    println!("   Environment: {}", config.environment.as_str());
    println!("   Webhook:     {}", if config.uses_webhook() { "on" } else { "off" });

    let sweeper = orchestrator.cache().clone().spawn_sweeper(SWEEP_INTERVAL);
    let served = helperbot_gateway::serve(&config, orchestrator).await;
    sweeper.abort();
    served?;

    Ok(())
}
