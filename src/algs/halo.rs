//! Halo exchange: refresh halo slots from the owning ranks.
//!
//! `exchange(field, comp, parity)` copies component `comp` of every remote
//! owned site of `parity` that this rank holds a halo slot for. Sequence per
//! call: post one receive per peer, pack and send the peer's send list, wait
//! for all receives, unpack into the halo slots, then drain the sends. Every
//! call reads the current owned values; nothing is cached between calls.
//!
//! Ranks without neighbor ranks (all axes unsliced) return immediately: their
//! neighbor tables already wrap inside the owned block.

use crate::algs::comlist::Comlists;
use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{pack_f64, unpack_f64};
use crate::data::field::Field;
use crate::lattice_error::LatticeError;
use crate::topology::geometry::Parity;
use std::mem::size_of;

/// Exchange component `comp` of `field` for halo sites of `parity`.
///
/// Collective over all ranks of the communicator; every rank must call it with
/// the same field kind, component and parity.
///
/// # Errors
/// [`LatticeError::CommError`] if a receive fails, times out or carries the
/// wrong number of bytes. The field's halo is then partially stale and the run
/// must stop.
pub fn exchange<C: Communicator>(
    comlists: &Comlists,
    comm: &C,
    field: &mut Field,
    comp: usize,
    parity: Parity,
) -> Result<(), LatticeError> {
    if comlists.is_empty() {
        return Ok(());
    }
    let dofs = field.dofs();
    let tag = CommTag::halo(field.kind().id(), comp, parity.index()).as_u16();

    // 1) post receives
    let mut recvs = Vec::with_capacity(comlists.links().len());
    for link in comlists.links() {
        let mut buf = vec![0u8; link.recv_list(parity).len() * dofs * size_of::<f64>()];
        recvs.push((link, comm.irecv(link.peer, tag, &mut buf)));
    }

    // 2) pack and send
    let mut pending_sends = Vec::with_capacity(comlists.links().len());
    let mut bytes_out = 0usize;
    for link in comlists.links() {
        let list = link.send_list(parity);
        let mut buf = Vec::with_capacity(list.len() * dofs * size_of::<f64>());
        for &site in list {
            pack_f64(field.get(site, comp), &mut buf);
        }
        bytes_out += buf.len();
        pending_sends.push(comm.isend(link.peer, tag, &buf));
    }

    // 3) wait and unpack
    let mut maybe_err = None;
    for (link, h) in recvs {
        let slots = link.recv_list(parity);
        let expected = slots.len() * dofs * size_of::<f64>();
        match h.wait() {
            Some(data) if data.len() == expected => {
                if maybe_err.is_none() {
                    for (&slot, chunk) in slots.iter().zip(data.chunks_exact(dofs * size_of::<f64>())) {
                        unpack_f64(chunk, field.get_mut(slot, comp));
                    }
                }
            }
            Some(data) if maybe_err.is_none() => {
                maybe_err = Some(LatticeError::comm(
                    link.peer,
                    format!(
                        "halo {:?}[{comp}] {parity:?}: expected {expected} bytes, got {}",
                        field.kind(),
                        data.len()
                    ),
                ));
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(LatticeError::comm(
                    link.peer,
                    format!("halo {:?}[{comp}] {parity:?}: receive failed", field.kind()),
                ));
            }
            _ => {}
        }
    }

    // 4) drain sends
    for send in pending_sends {
        let _ = send.wait();
    }

    log::trace!(
        "halo {:?}[{comp}] {parity:?}: {bytes_out} bytes to {} peers",
        field.kind(),
        comlists.links().len()
    );
    match maybe_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Exchange every component of `field` for `parity`.
pub fn exchange_components<C: Communicator>(
    comlists: &Comlists,
    comm: &C,
    field: &mut Field,
    parity: Parity,
) -> Result<(), LatticeError> {
    for comp in 0..field.comps() {
        exchange(comlists, comm, field, comp, parity)?;
    }
    Ok(())
}

/// Exchange every component and both parities of `field`.
pub fn exchange_full<C: Communicator>(
    comlists: &Comlists,
    comm: &C,
    field: &mut Field,
) -> Result<(), LatticeError> {
    for parity in Parity::ALL {
        exchange_components(comlists, comm, field, parity)?;
    }
    Ok(())
}
