//! Address allocation.
//!
//! Deterministic linear scan from the pool's configured start address to
//! the subnet's last usable host. Addresses are never recycled: the
//! reserved set covers every peer ever created, disabled ones included, so
//! a stale reference can never collide with a new grant.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

/// Allocation failures.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// Every usable address from the start onward is taken.
    #[error("address pool exhausted")]
    PoolExhausted,

    /// The configured start address is not inside the subnet.
    #[error("pool start {start} is outside subnet {subnet}")]
    StartOutsideSubnet { start: Ipv4Addr, subnet: Ipv4Net },
}

/// Pick the next unused address.
///
/// Pure function: the caller runs it inside the same transaction as the
/// peer insertion that consumes the result, which is what makes
/// read-then-reserve safe under concurrency.
pub fn allocate(
    subnet: Ipv4Net,
    pool_start: Ipv4Addr,
    reserved: &HashSet<Ipv4Addr>,
) -> Result<Ipv4Addr, AllocError> {
    if !subnet.contains(&pool_start) {
        return Err(AllocError::StartOutsideSubnet {
            start: pool_start,
            subnet,
        });
    }

    // Network and broadcast addresses are not usable hosts except in the
    // degenerate /31 and /32 cases.
    let (first_usable, last_usable) = if subnet.prefix_len() >= 31 {
        (subnet.network(), subnet.broadcast())
    } else {
        (
            Ipv4Addr::from(u32::from(subnet.network()) + 1),
            Ipv4Addr::from(u32::from(subnet.broadcast()) - 1),
        )
    };

    let start = pool_start.max(first_usable);
    for raw in u32::from(start)..=u32::from(last_usable) {
        let candidate = Ipv4Addr::from(raw);
        if !reserved.contains(&candidate) {
            return Ok(candidate);
        }
    }

    Err(AllocError::PoolExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subnet(s: &str) -> Ipv4Net {
        s.parse().expect("subnet")
    }

    fn addr(s: &str) -> Ipv4Addr {
        s.parse().expect("addr")
    }

    #[test]
    fn test_first_allocation_is_pool_start() {
        let got = allocate(subnet("10.0.0.0/24"), addr("10.0.0.5"), &HashSet::new())
            .expect("allocate");
        assert_eq!(got, addr("10.0.0.5"));
    }

    #[test]
    fn test_skips_reserved_including_gaps() {
        let reserved: HashSet<Ipv4Addr> =
            [addr("10.0.0.5"), addr("10.0.0.6"), addr("10.0.0.8")].into();
        let got = allocate(subnet("10.0.0.0/24"), addr("10.0.0.5"), &reserved).expect("allocate");
        assert_eq!(got, addr("10.0.0.7"));
    }

    #[test]
    fn test_deterministic() {
        let reserved: HashSet<Ipv4Addr> = [addr("10.0.0.5")].into();
        let a = allocate(subnet("10.0.0.0/24"), addr("10.0.0.5"), &reserved).expect("allocate");
        let b = allocate(subnet("10.0.0.0/24"), addr("10.0.0.5"), &reserved).expect("allocate");
        assert_eq!(a, b);
    }

    #[test]
    fn test_exhaustion_past_last_usable_host() {
        // Pool start near the top of a /24: .253 and .254 are usable,
        // .255 is broadcast.
        let reserved: HashSet<Ipv4Addr> = [addr("10.0.0.253"), addr("10.0.0.254")].into();
        let result = allocate(subnet("10.0.0.0/24"), addr("10.0.0.253"), &reserved);
        assert_eq!(result, Err(AllocError::PoolExhausted));
    }

    #[test]
    fn test_broadcast_never_allocated() {
        let reserved: HashSet<Ipv4Addr> = [addr("10.0.0.254")].into();
        let result = allocate(subnet("10.0.0.0/24"), addr("10.0.0.254"), &reserved);
        assert_eq!(result, Err(AllocError::PoolExhausted));
    }

    #[test]
    fn test_full_pool_exhausts_deterministically() {
        let net = subnet("10.0.0.0/29"); // usable: .1 through .6
        let reserved: HashSet<Ipv4Addr> = (1..=6).map(|i| Ipv4Addr::new(10, 0, 0, i)).collect();
        assert_eq!(
            allocate(net, addr("10.0.0.1"), &reserved),
            Err(AllocError::PoolExhausted)
        );
    }

    #[test]
    fn test_start_outside_subnet_rejected() {
        let result = allocate(subnet("10.0.0.0/24"), addr("192.168.1.5"), &HashSet::new());
        assert!(matches!(result, Err(AllocError::StartOutsideSubnet { .. })));
    }

    #[test]
    fn test_start_below_first_usable_clamps_up() {
        // Pool start at the network address: first usable host wins.
        let got = allocate(subnet("10.0.0.0/24"), addr("10.0.0.0"), &HashSet::new())
            .expect("allocate");
        assert_eq!(got, addr("10.0.0.1"));
    }
}
