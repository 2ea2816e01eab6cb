use itertools::{Itertools, Product};
use std::net::{IpAddr, SocketAddr};

/// Lazily yields every address paired with every port.
///
/// Addresses are the outer loop and are pulled one at a time, so the address
/// source can be as large as a /8 (or unbounded) without being collected.
/// Only the port list is cloned per address.
pub struct TargetIterator<I: Iterator<Item = IpAddr>> {
    product: Product<I, std::vec::IntoIter<u16>>,
}

impl<I: Iterator<Item = IpAddr>> TargetIterator<I> {
    pub fn new<A>(addresses: A, ports: Vec<u16>) -> Self
    where
        A: IntoIterator<IntoIter = I>,
    {
        Self {
            product: addresses.into_iter().cartesian_product(ports),
        }
    }
}

impl<I: Iterator<Item = IpAddr>> Iterator for TargetIterator<I> {
    type Item = SocketAddr;

    fn next(&mut self) -> Option<Self::Item> {
        self.product
            .next()
            .map(|(ip, port)| SocketAddr::new(ip, port))
    }
}
