//! Stage 2 of comlist negotiation: exchange site manifests.
//!
//! A manifest is the ordered list of global site indices one rank wants to
//! receive from a peer. The peer answers by sending exactly those sites, in
//! exactly that order, on every halo exchange.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{WireSite, cast_slice, decode_records, expect_exact_len};
use crate::lattice_error::LatticeError;
use std::mem::size_of;

/// Send `requests[k]` to `peers[k]` and receive the manifest each peer sent,
/// whose length must be `incoming_len[k]` (from the count handshake).
pub fn exchange_manifests<C>(
    comm: &C,
    peers: &[usize],
    requests: &[Vec<u64>],
    incoming_len: &[usize],
    tag: CommTag,
) -> Result<Vec<Vec<u64>>, LatticeError>
where
    C: Communicator,
{
    let mut recvs = Vec::with_capacity(peers.len());
    for (&peer, &n) in peers.iter().zip(incoming_len) {
        let mut buf = vec![0u8; n * size_of::<WireSite>()];
        recvs.push((peer, n, comm.irecv(peer, tag.as_u16(), &mut buf)));
    }

    let mut pending_sends = Vec::with_capacity(peers.len());
    for (&peer, req) in peers.iter().zip(requests) {
        let wire: Vec<WireSite> = req.iter().map(|&g| WireSite::of(g)).collect();
        pending_sends.push(comm.isend(peer, tag.as_u16(), cast_slice(&wire)));
    }

    let mut manifests = Vec::with_capacity(peers.len());
    let mut maybe_err = None;
    for (peer, n, h) in recvs {
        match h.wait() {
            Some(data) => match expect_exact_len(data.len(), n * size_of::<WireSite>()) {
                Ok(()) => {
                    let sites: Vec<WireSite> = decode_records(&data);
                    manifests.push(sites.iter().map(WireSite::get).collect());
                }
                Err(msg) if maybe_err.is_none() => {
                    maybe_err = Some(LatticeError::comm(peer, format!("manifest: {msg}")));
                }
                Err(_) => {}
            },
            None if maybe_err.is_none() => {
                maybe_err = Some(LatticeError::comm(
                    peer,
                    format!("failed to receive manifest from rank {peer}"),
                ));
            }
            None => {}
        }
    }

    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(manifests),
    }
}
