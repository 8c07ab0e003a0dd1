// Example: Installing a session key and incrementing the counter with it
//
// This example demonstrates how to:
// 1. Load configuration from `sessionkit.toml` and `SESSIONKIT_*` variables
// 2. Attach the owner's smart account and provision a session key
// 3. Submit counter increments signed only by the session key
//
// Required: SESSIONKIT_API_KEY (or SESSIONKIT_RPC_URL), SESSIONKIT_PRIVATE_KEY,
// COUNTER_ADDRESS. A `.env` file is picked up if present.

use sessionkit_sdk::{
    utils, AccessPolicy, AccountSessionManager, CounterContract, OperationSubmitter,
    PermissionsBuilder, PrimaryIdentity, ReadClient, SessionKey, SessionKeyController,
    SessionKitConfig, StateReader,
};
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 1. Configuration
    let config_file = Path::new("sessionkit.toml");
    let config = SessionKitConfig::load(config_file.exists().then_some(config_file))?;
    let private_key = config
        .private_key
        .clone()
        .ok_or_else(|| anyhow::anyhow!("SESSIONKIT_PRIVATE_KEY is not set"))?;
    let counter = CounterContract::new(std::env::var("COUNTER_ADDRESS")?.parse()?);

    let owner = PrimaryIdentity::from_private_key(&private_key)?;
    let manager = AccountSessionManager::connect(config)?;

    // 2. Session key limited to the counter, valid for one hour
    let session_key = SessionKey::generate();
    let permissions = PermissionsBuilder::new()
        .access(AccessPolicy::allow_list([counter.address]))
        .valid_for(utils::unix_now(), 3600);

    println!("Owner:       {}", owner.address());
    println!("Session key: {}", session_key.address());

    let mut controller = SessionKeyController::new(manager, owner, session_key, permissions)
        .with_label("counter demo");
    let client = controller.run().await?;
    println!("Account:     {}", client.account_address());

    // 3. Increment with the session key and read back
    let reader = StateReader::new(&client);
    let before = counter.count_of(&reader, client.account_address()).await?;

    let submitter = OperationSubmitter::new();
    let submitted = submitter
        .submit(&client, vec![counter.increment_one()])
        .await?;
    println!("Confirmed:   {}", submitted.user_op_hash);

    let after = counter.count_of(&reader, client.account_address()).await?;
    println!("Counter:     {} -> {}", before, after);

    Ok(())
}
