//! Balance propagation (spec §4.5): distribute a root-level
//! `delta_walkers` down the tree as per-node integer shares, then
//! rebalance siblings toward an even split subject to their
//! mergeable/cloneable capacity.
//!
//! This resolves spec §9 open question 1: dispensation mutates only a
//! function-local `remaining`, compared against zero for termination;
//! the node's own `balance` field is written exactly once, after the
//! dispense+rebalance pass for its parent has finished.

use crate::error::RegionTreeError;
use crate::region_tree::{NodeId, RegionTree};

struct ChildShares {
    id: NodeId,
    shares: i64,
    net_balance: i64,
    n_mergeable: usize,
    n_cloneable: usize,
}

/// Run balance propagation over the whole tree for this cycle. Leaves'
/// `balance` fields hold the final per-leaf share delta on return.
pub fn balance_tree<I: Clone>(tree: &mut RegionTree<I>, delta_walkers: i64) -> Result<(), RegionTreeError> {
    tree.node_mut(&NodeId::root()).expect("root always exists").balance = delta_walkers;

    let n_levels = tree.config().n_levels();
    for level in 0..n_levels {
        for parent in tree.level_nodes(level) {
            let children_ids = tree.children(&parent).to_vec();
            if children_ids.is_empty() {
                continue;
            }
            let parent_balance = tree.node(&parent).expect("parent must exist").balance;

            let mut children: Vec<ChildShares> = children_ids
                .iter()
                .map(|id| {
                    let state = tree.node(id).expect("child must exist");
                    ChildShares {
                        id: id.clone(),
                        shares: state.n_walkers as i64,
                        net_balance: 0,
                        n_mergeable: state.n_mergeable,
                        n_cloneable: state.n_cloneable,
                    }
                })
                .collect();

            dispense(parent_balance, &mut children)?;
            rebalance(&mut children);

            for child in &children {
                tree.node_mut(&child.id).expect("child must exist").balance = child.net_balance;
            }
        }
    }

    let delta_check: i64 = tree.leaf_nodes().iter().map(|leaf| tree.node(leaf).unwrap().balance).sum();
    if delta_check != delta_walkers {
        return Err(RegionTreeError::invariant(format!(
            "leaf balances sum to {delta_check}, expected delta_walkers {delta_walkers}"
        )));
    }

    Ok(())
}

/// Dispense a parent's balance to its children in a valid, but not
/// necessarily fair, way (spec §4.5 "Dispense").
fn dispense(parent_balance: i64, children: &mut [ChildShares]) -> Result<(), RegionTreeError> {
    if children.len() == 1 {
        children[0].net_balance = parent_balance;
        children[0].shares += parent_balance;
        return Ok(());
    }

    if parent_balance == 0 {
        return Ok(());
    }

    let mut remaining = parent_balance;
    if parent_balance < 0 {
        for child in children.iter_mut() {
            if remaining == 0 {
                break;
            }
            let payment = (child.n_mergeable as i64).min(remaining.abs());
            remaining += payment;
            child.net_balance -= payment;
            child.shares -= payment;
        }
        if remaining < 0 {
            return Err(RegionTreeError::capacity(format!(
                "children cannot pay their parent's debt of {parent_balance} (short by {})",
                -remaining
            )));
        }
    } else {
        for child in children.iter_mut() {
            if remaining == 0 {
                break;
            }
            let disbursement = (child.n_cloneable as i64).min(remaining);
            remaining -= disbursement;
            child.net_balance += disbursement;
            child.shares += disbursement;
        }
        if remaining > 0 {
            return Err(RegionTreeError::capacity(format!(
                "children cannot accept their parent's credit of {parent_balance} (short by {remaining})"
            )));
        }
    }

    Ok(())
}

/// Redistribute shares between siblings to equalize their totals,
/// subject to donatable/receivable capacity (spec §4.5 "Rebalance").
fn rebalance(children: &mut [ChildShares]) {
    let mut previous_donation: Option<i64> = None;

    loop {
        let Some((donor_idx, acceptor_idx)) = find_best_donation_pair(children) else {
            break;
        };
        let donation = share_donation(&children[donor_idx], &children[acceptor_idx]);

        if donation <= 0 {
            break;
        }
        if previous_donation == Some(1) && donation == 1 {
            break;
        }

        children[donor_idx].shares -= donation;
        children[donor_idx].net_balance -= donation;
        children[acceptor_idx].shares += donation;
        children[acceptor_idx].net_balance += donation;

        previous_donation = Some(donation);
    }
}

/// Donor = largest share total with `n_mergeable > 0`; acceptor =
/// smallest share total with `n_cloneable > 0`. `None` if no such pair
/// exists, or the donor does not strictly exceed the acceptor.
fn find_best_donation_pair(children: &[ChildShares]) -> Option<(usize, usize)> {
    let mut donor: Option<usize> = None;
    let mut acceptor: Option<usize> = None;

    for (idx, child) in children.iter().enumerate() {
        if child.n_mergeable > 0 && donor.map_or(true, |d: usize| child.shares > children[d].shares) {
            donor = Some(idx);
        }
        if child.n_cloneable > 0 && acceptor.map_or(true, |a: usize| child.shares < children[a].shares) {
            acceptor = Some(idx);
        }
    }

    let (d, a) = (donor?, acceptor?);
    if children[d].shares > children[a].shares {
        Some((d, a))
    } else {
        None
    }
}

fn share_donation(donor: &ChildShares, acceptor: &ChildShares) -> i64 {
    let desired = (donor.shares - acceptor.shares).div_euclid(2);
    desired.min(donor.n_mergeable as i64)
}
