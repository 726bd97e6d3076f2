//! Stage 1 of comlist negotiation: exchange per-parity counts with each peer.
//!
//! Every call posts all receives first, then all sends, and drains every send
//! handle before returning, even if a receive failed.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{WireCount, cast_slice, decode_records};
use crate::lattice_error::LatticeError;
use std::mem::size_of;

/// Send `outgoing[k]` (one count per parity) to `peers[k]` and return the pair
/// of counts each peer sent back, in `peers` order.
pub fn exchange_parity_counts<C>(
    comm: &C,
    peers: &[usize],
    outgoing: &[[usize; 2]],
    tag: CommTag,
) -> Result<Vec<[usize; 2]>, LatticeError>
where
    C: Communicator,
{
    debug_assert_eq!(peers.len(), outgoing.len());
    let expected = 2 * size_of::<WireCount>();

    // 1) post all receives
    let mut recvs = Vec::with_capacity(peers.len());
    for &peer in peers {
        let mut buf = vec![0u8; expected];
        recvs.push((peer, comm.irecv(peer, tag.as_u16(), &mut buf)));
    }

    // 2) post all sends
    let mut pending_sends = Vec::with_capacity(peers.len());
    for (&peer, counts) in peers.iter().zip(outgoing) {
        let wire = [WireCount::new(counts[0]), WireCount::new(counts[1])];
        pending_sends.push(comm.isend(peer, tag.as_u16(), cast_slice(&wire)));
    }

    // 3) wait for all receives, keep the first error
    let mut counts_in = Vec::with_capacity(peers.len());
    let mut maybe_err = None;
    for (peer, h) in recvs {
        match h.wait() {
            Some(data) if data.len() == expected => {
                let wire: Vec<WireCount> = decode_records(&data);
                counts_in.push([wire[0].get(), wire[1].get()]);
            }
            Some(data) if maybe_err.is_none() => {
                maybe_err = Some(LatticeError::comm(
                    peer,
                    format!("expected {expected} bytes for count header, got {}", data.len()),
                ));
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(LatticeError::comm(
                    peer,
                    format!("failed to receive counts from rank {peer}"),
                ));
            }
            _ => {}
        }
    }

    // 4) always drain sends
    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(counts_in),
    }
}
