//! BIP-44 path builders and gap-limit account/address discovery.

use crate::keypath::KeyPath;
use std::future::Future;

/// `m/44'/coin_type'/account'`. `coin_type` and `account` may be given with
/// or without the hardened bit; it is OR'd in if absent.
pub fn account_path(coin_type: u32, account: u32) -> KeyPath {
    KeyPath::root()
        .append_hardened(44)
        .append_hardened(coin_type)
        .append_hardened(account)
}

/// `m/44'/coin_type'/account'/change/address_index`, `change` in `{0, 1}`.
pub fn address_path(coin_type: u32, account: u32, change: u32, address_index: u32) -> KeyPath {
    account_path(coin_type, account).append(change).append(address_index)
}

/// Scan both chains of `account_path` for used addresses.
///
/// For each chain in `[0, 1]` in order, probes `address_index = 0, 1, 2, …`
/// until `gap_limit` consecutive misses. The internal (change) chain is
/// only scanned if the external chain yielded at least one hit. Returns
/// every path the probe reported as used, in the order discovered.
///
/// Dropping the returned future before it resolves stops the walk without
/// issuing further probes.
pub async fn discover_used_addresses<F, Fut, E>(
    account_path: &KeyPath,
    mut probe: F,
    gap_limit: u32,
) -> Result<Vec<KeyPath>, E>
where
    F: FnMut(KeyPath) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let mut found = Vec::new();
    let mut external_hit = false;

    for chain in [0u32, 1u32] {
        if chain == 1 && !external_hit {
            continue;
        }

        let mut consecutive_misses = 0u32;
        let mut address_index = 0u32;
        loop {
            let path = account_path.append(chain).append(address_index);
            if probe(path.clone()).await? {
                found.push(path);
                consecutive_misses = 0;
                if chain == 0 {
                    external_hit = true;
                }
            } else {
                consecutive_misses += 1;
                if consecutive_misses >= gap_limit {
                    break;
                }
            }
            address_index += 1;
        }
    }

    Ok(found)
}

/// Scan `coin_type` for used accounts, one gap-limited
/// [`discover_used_addresses`] walk per account. Stops after the first
/// account with no used addresses (account gap limit is fixed at 1).
pub async fn discover_used_accounts<F, Fut, E>(
    coin_type: u32,
    mut probe: F,
    gap_limit: u32,
) -> Result<Vec<KeyPath>, E>
where
    F: FnMut(KeyPath) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let mut used_accounts = Vec::new();
    let mut account = 0u32;
    loop {
        let path = account_path(coin_type, account);
        let hits = discover_used_addresses(&path, &mut probe, gap_limit).await?;
        if hits.is_empty() {
            break;
        }
        used_accounts.push(path);
        account += 1;
    }
    Ok(used_accounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    // Every probe in these tests resolves immediately, so a no-op waker and
    // a single poll per future is enough to drive them to completion.
    fn noop_waker() -> Waker {
        fn clone(_: *const ()) -> RawWaker {
            raw()
        }
        fn noop(_: *const ()) {}
        fn raw() -> RawWaker {
            static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
            RawWaker::new(std::ptr::null(), &VTABLE)
        }
        unsafe { Waker::from_raw(raw()) }
    }

    fn block_on<F: Future>(mut fut: F) -> F::Output {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut fut = unsafe { std::pin::Pin::new_unchecked(&mut fut) };
        loop {
            if let Poll::Ready(v) = fut.as_mut().poll(&mut cx) {
                return v;
            }
        }
    }

    #[test]
    fn bip44_account_and_address_path_builders() {
        assert_eq!(account_path(0, 0).to_string(), "m/44'/0'/0'");
        assert_eq!(address_path(0, 0, 1, 5).to_string(), "m/44'/0'/0'/1/5");
    }

    #[test]
    fn hardened_bit_is_ored_in_when_caller_already_set_it() {
        let a = account_path(133, 0);
        let b = account_path(133 | 0x8000_0000, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn s7_walker_scenario() {
        let account = account_path(133, 0);
        let probe = |p: KeyPath| {
            let used = p.to_string() == "m/44'/133'/0'/0/2";
            async move { Ok::<bool, std::convert::Infallible>(used) }
        };

        let visited = RefCell::new(Vec::new());
        let counting_probe = |p: KeyPath| {
            visited.borrow_mut().push(p.to_string());
            probe(p)
        };

        let hits = block_on(discover_used_addresses(&account, counting_probe, 4)).unwrap();
        assert_eq!(
            hits.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
            vec!["m/44'/133'/0'/0/2"]
        );
        assert_eq!(
            *visited.borrow(),
            vec![
                "m/44'/133'/0'/0/0",
                "m/44'/133'/0'/0/1",
                "m/44'/133'/0'/0/2",
                "m/44'/133'/0'/0/3",
                "m/44'/133'/0'/0/4",
                "m/44'/133'/0'/0/5",
                "m/44'/133'/0'/0/6",
            ]
        );
    }

    #[test]
    fn s7_account_discovery_stops_after_one_unused_account() {
        let probe = |p: KeyPath| {
            let used = p.to_string() == "m/44'/133'/0'/0/2";
            async move { Ok::<bool, std::convert::Infallible>(used) }
        };

        let used = block_on(discover_used_accounts(133, probe, 4)).unwrap();
        assert_eq!(
            used.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
            vec!["m/44'/133'/0'"]
        );
    }

    #[test]
    fn probe_error_propagates_and_aborts_the_walk() {
        let calls = RefCell::new(0u32);
        let probe = |_p: KeyPath| {
            *calls.borrow_mut() += 1;
            async move { Err::<bool, &'static str>("probe failed") }
        };

        let account = account_path(0, 0);
        let result = block_on(discover_used_addresses(&account, probe, 4));
        assert_eq!(result, Err("probe failed"));
        assert_eq!(*calls.borrow(), 1);
    }
}
