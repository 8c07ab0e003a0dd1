// Example: Building and inspecting session key permissions offline
//
// This example demonstrates how to:
// 1. Describe what a session key may do
// 2. Encode it into the permission updates the plugin consumes
// 3. Decode the updates back into a descriptor

use alloy_primitives::{Address, U256};
use sessionkit_sdk::{utils, AccessPolicy, PermissionsBuilder};

fn main() -> anyhow::Result<()> {
    // 1. Two allowed targets, 0.01 ETH per day, valid for a week
    let descriptor = PermissionsBuilder::new()
        .access(AccessPolicy::allow_list([
            Address::repeat_byte(0x11),
            Address::repeat_byte(0x22),
        ]))
        .spend_limit(U256::from(10_000_000_000_000_000u64))
        .refresh_interval(86_400)
        .valid_for(utils::unix_now(), 7 * 86_400)
        .build()?;

    // 2. Encode
    let encoded = descriptor.encode();
    println!("{} permission updates:", encoded.updates().len());
    for update in encoded.updates() {
        println!("  {}", update);
    }

    // 3. Decode
    let decoded = encoded.decode()?;
    assert_eq!(decoded, descriptor);
    println!(
        "Valid from {} until {}, spend limit {} wei",
        decoded.valid_from(),
        decoded.valid_until(),
        decoded.spend_limit()
    );

    Ok(())
}
