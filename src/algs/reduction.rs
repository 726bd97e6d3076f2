//! Global reductions over all ranks.
//!
//! Sums are gathered on rank 0, added in rank order and broadcast back, so
//! every rank ends up with bit-identical totals. Reductions are collective:
//! all ranks must call them in the same order. [`gather_to_root`] collects
//! equal-length blocks on rank 0 without broadcasting.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{expect_exact_len, pack_f64, unpack_f64};
use crate::lattice_error::LatticeError;
use std::mem::size_of;

const ROOT: usize = 0;

fn recv_values<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: CommTag,
    out: &mut [f64],
) -> Result<(), LatticeError> {
    let mut buf = vec![0u8; out.len() * size_of::<f64>()];
    let data = comm
        .irecv(peer, tag.as_u16(), &mut buf)
        .wait()
        .ok_or_else(|| LatticeError::comm(peer, "reduction: receive failed"))?;
    expect_exact_len(data.len(), buf.len())
        .map_err(|msg| LatticeError::comm(peer, format!("reduction: {msg}")))?;
    unpack_f64(&data, out);
    Ok(())
}

/// Element-wise global sum of `local` over all ranks.
pub fn reduce_sum_slice<C: Communicator>(comm: &C, local: &[f64]) -> Result<Vec<f64>, LatticeError> {
    let size = comm.size();
    if size == 1 {
        return Ok(local.to_vec());
    }
    let mut bytes = Vec::new();
    if comm.rank() == ROOT {
        let mut total = local.to_vec();
        let mut part = vec![0.0; local.len()];
        for peer in 1..size {
            recv_values(comm, peer, CommTag::REDUCE_GATHER, &mut part)?;
            for (t, p) in total.iter_mut().zip(&part) {
                *t += p;
            }
        }
        pack_f64(&total, &mut bytes);
        let sends: Vec<_> = (1..size)
            .map(|peer| comm.isend(peer, CommTag::REDUCE_BCAST.as_u16(), &bytes))
            .collect();
        for s in sends {
            let _ = s.wait();
        }
        Ok(total)
    } else {
        pack_f64(local, &mut bytes);
        let send = comm.isend(ROOT, CommTag::REDUCE_GATHER.as_u16(), &bytes);
        let mut total = vec![0.0; local.len()];
        let res = recv_values(comm, ROOT, CommTag::REDUCE_BCAST, &mut total);
        let _ = send.wait();
        res.map(|()| total)
    }
}

/// Concatenate every rank's `local` on rank 0, in rank order. All ranks must
/// pass blocks of the same length. Rank 0 gets `Some`, the others `None`.
pub fn gather_to_root<C: Communicator>(comm: &C, local: &[f64]) -> Result<Option<Vec<f64>>, LatticeError> {
    if comm.rank() != ROOT {
        let mut bytes = Vec::new();
        pack_f64(local, &mut bytes);
        let _ = comm.isend(ROOT, CommTag::GATHER.as_u16(), &bytes).wait();
        return Ok(None);
    }
    let mut all = Vec::with_capacity(local.len() * comm.size());
    all.extend_from_slice(local);
    let mut part = vec![0.0; local.len()];
    for peer in 1..comm.size() {
        recv_values(comm, peer, CommTag::GATHER, &mut part)?;
        all.extend_from_slice(&part);
    }
    Ok(Some(all))
}

/// Global sum of one value.
pub fn reduce_sum<C: Communicator>(comm: &C, local: f64) -> Result<f64, LatticeError> {
    Ok(reduce_sum_slice(comm, &[local])?[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{LocalComm, NoComm};

    #[test]
    fn single_rank_sum_is_identity() {
        assert_eq!(reduce_sum(&NoComm, 2.5).unwrap(), 2.5);
    }

    #[test]
    fn gather_concatenates_in_rank_order() {
        let world = LocalComm::world(3);
        let got: Vec<Option<Vec<f64>>> = std::thread::scope(|s| {
            let hs: Vec<_> = world
                .iter()
                .map(|c| {
                    s.spawn(move || {
                        let r = c.rank() as f64;
                        gather_to_root(c, &[r, 10.0 + r]).unwrap()
                    })
                })
                .collect();
            hs.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(got[0], Some(vec![0.0, 10.0, 1.0, 11.0, 2.0, 12.0]));
        assert!(got[1].is_none() && got[2].is_none());
    }

    #[test]
    fn short_gather_block_is_a_comm_error() {
        let world = LocalComm::world(2);
        let results: Vec<_> = std::thread::scope(|s| {
            let hs: Vec<_> = world
                .iter()
                .map(|c| s.spawn(move || gather_to_root(c, &vec![1.0; 3 - c.rank()])))
                .collect();
            hs.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(matches!(results[0], Err(LatticeError::CommError { neighbor: 1, .. })));
    }

    #[test]
    fn all_ranks_get_the_same_total() {
        let world = LocalComm::world(4);
        let totals: Vec<Vec<f64>> = std::thread::scope(|s| {
            let hs: Vec<_> = world
                .iter()
                .map(|c| {
                    s.spawn(move || {
                        let r = c.rank() as f64;
                        reduce_sum_slice(c, &[r, 1.0, 0.1 * r]).unwrap()
                    })
                })
                .collect();
            hs.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(totals[0][0], 6.0);
        assert_eq!(totals[0][1], 4.0);
        for t in &totals[1..] {
            for (a, b) in t.iter().zip(&totals[0]) {
                assert_eq!(a.to_bits(), b.to_bits());
            }
        }
    }
}
