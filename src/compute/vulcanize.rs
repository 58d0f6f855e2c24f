//! Finishing passes that stiffen a grown structure with extra pulls.

use std::collections::{BTreeSet, HashMap};

use log::debug;

use super::engine::Engine;
use super::fabric::{Fabric, FabricError, Interval, IntervalKey, IntervalRole, JointKey};

/// Close the open triangle between pairs of adjacent pushes.
///
/// Two pushes are adjacent when exactly one pull joins their ends. For each
/// adjacent pair accepted by `filter`, the closest pair of their ends not
/// yet joined gets a triangle pull. Returns the number of pulls added.
pub fn triangulate<E: Engine>(
    fabric: &mut Fabric<E>,
    filter: impl Fn(&Interval, &Interval) -> bool,
) -> Result<usize, FabricError> {
    let pushes: Vec<(IntervalKey, Interval)> = fabric
        .intervals()
        .filter(|(_, interval)| interval.role.is_push())
        .map(|(key, interval)| (key, interval.clone()))
        .collect();

    let mut additions = Vec::new();
    for (i, (_, first)) in pushes.iter().enumerate() {
        for (_, second) in &pushes[i + 1..] {
            let pairs = [
                (first.alpha, second.alpha),
                (first.alpha, second.omega),
                (first.omega, second.alpha),
                (first.omega, second.omega),
            ];
            let joined = pairs
                .iter()
                .filter(|(a, b)| fabric.connected(*a, *b))
                .count();
            if joined != 1 || !filter(first, second) {
                continue;
            }
            let mut closest: Option<((JointKey, JointKey), f32)> = None;
            for &(a, b) in &pairs {
                if fabric.connected(a, b) {
                    continue;
                }
                let distance = fabric.distance(a, b)?;
                if closest.is_none_or(|(_, nearest)| distance < nearest) {
                    closest = Some(((a, b), distance));
                }
            }
            if let Some((pair, _)) = closest {
                additions.push((pair, (first.scale + second.scale) / 2.0));
            }
        }
    }

    for &((a, b), scale) in &additions {
        fabric.create_interval(a, b, IntervalRole::Triangle, scale)?;
    }
    debug!("triangulate added {} pulls", additions.len());
    Ok(additions.len())
}

/// Bow pulls between push tips that share pull neighbours.
///
/// Tips of different pushes that are not yet joined get a `BowMid` pull
/// when they share two or more neighbours and a `BowEnd` pull when they
/// share one. Neighbours are counted over structural pulls only, so running
/// the pass again adds nothing. Returns the number of pulls added.
pub fn vulcanize<E: Engine>(
    fabric: &mut Fabric<E>,
    filter: impl Fn(JointKey, JointKey) -> bool,
) -> Result<usize, FabricError> {
    let mut push_partner: HashMap<JointKey, (JointKey, f32)> = HashMap::new();
    let mut neighbours: HashMap<JointKey, BTreeSet<JointKey>> = HashMap::new();
    for (_, interval) in fabric.intervals() {
        match interval.role {
            IntervalRole::Push => {
                push_partner.insert(interval.alpha, (interval.omega, interval.scale));
                push_partner.insert(interval.omega, (interval.alpha, interval.scale));
            }
            IntervalRole::Ring | IntervalRole::Cross | IntervalRole::Triangle => {
                neighbours
                    .entry(interval.alpha)
                    .or_default()
                    .insert(interval.omega);
                neighbours
                    .entry(interval.omega)
                    .or_default()
                    .insert(interval.alpha);
            }
            _ => {}
        }
    }

    let tips: Vec<JointKey> = fabric
        .joints()
        .filter(|joint| push_partner.contains_key(joint))
        .collect();
    let empty = BTreeSet::new();
    let mut additions = Vec::new();
    for (i, &a) in tips.iter().enumerate() {
        for &b in &tips[i + 1..] {
            let same_push = push_partner.get(&a).is_some_and(|(partner, _)| *partner == b);
            if same_push || fabric.connected(a, b) || !filter(a, b) {
                continue;
            }
            let shared = neighbours
                .get(&a)
                .unwrap_or(&empty)
                .intersection(neighbours.get(&b).unwrap_or(&empty))
                .count();
            let role = match shared {
                0 => continue,
                1 => IntervalRole::BowEnd,
                _ => IntervalRole::BowMid,
            };
            let scale = push_partner.get(&a).map_or(1.0, |(_, scale)| *scale);
            additions.push((a, b, role, scale));
        }
    }

    for &(a, b, role, scale) in &additions {
        fabric.create_interval(a, b, role, scale)?;
    }
    debug!("vulcanize added {} pulls", additions.len());
    Ok(additions.len())
}
