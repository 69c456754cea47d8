// SPDX-License-Identifier: Apache-2.0

use chemmap_model::{Fingerprint, FingerprintParams, ValidationError};

use crate::smiles::{parse_smiles, Molecule};

/// Converts one structure identifier into a fingerprint.
///
/// Implementations must be pure: the pool calls `encode` from several worker
/// threads at once and relies on identical output for identical input.
pub trait StructureEncoder: Send + Sync {
    fn params(&self) -> FingerprintParams;

    /// `None` when the identifier does not describe a valid structure.
    fn encode(&self, structure: &str) -> Option<Fingerprint>;
}

/// Circular (Morgan / ECFP-style) fingerprint folded to `n_bits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MorganEncoder {
    params: FingerprintParams,
}

impl MorganEncoder {
    pub fn new(params: FingerprintParams) -> Result<Self, ValidationError> {
        params.validate()?;
        Ok(Self { params })
    }

    #[must_use]
    pub fn fingerprint_molecule(&self, mol: &Molecule) -> Option<Fingerprint> {
        let n_bits = self.params.n_bits;
        let mut identifiers: Vec<u64> = (0..mol.atoms.len())
            .map(|i| atom_invariant(mol, i))
            .collect();
        let mut bits: Vec<u32> = identifiers.iter().map(|id| fold(*id, n_bits)).collect();

        let mut env: Vec<(u64, u64)> = Vec::new();
        for round in 1..=self.params.radius {
            let next: Vec<u64> = (0..mol.atoms.len())
                .map(|i| {
                    env.clear();
                    env.extend(mol.neighbors(i).iter().map(|(nbr, bond)| {
                        (mol.bonds[*bond].order.code(), identifiers[*nbr])
                    }));
                    env.sort_unstable();
                    let mut h = mix(u64::from(round), identifiers[i]);
                    for (order, id) in &env {
                        h = mix(mix(h, *order), *id);
                    }
                    h
                })
                .collect();
            bits.extend(next.iter().map(|id| fold(*id, n_bits)));
            identifiers = next;
        }

        Fingerprint::from_on_bits(n_bits, bits).ok()
    }
}

impl StructureEncoder for MorganEncoder {
    fn params(&self) -> FingerprintParams {
        self.params
    }

    fn encode(&self, structure: &str) -> Option<Fingerprint> {
        let mol = parse_smiles(structure).ok()?;
        self.fingerprint_molecule(&mol)
    }
}

fn atom_invariant(mol: &Molecule, i: usize) -> u64 {
    let atom = &mol.atoms[i];
    let explicit_h = mol
        .neighbors(i)
        .iter()
        .filter(|(n, _)| mol.atoms[*n].atomic_number == 1)
        .count() as u64;
    let heavy_degree = mol.degree(i) as u64 - explicit_h;
    let fields = [
        u64::from(atom.atomic_number),
        heavy_degree,
        u64::from(atom.hydrogens) + explicit_h,
        atom.charge as i64 as u64,
        u64::from(atom.isotope.unwrap_or(0)),
        u64::from(atom.in_ring),
        u64::from(atom.aromatic),
    ];
    fields.iter().fold(0x9e37_79b9_7f4a_7c15, |h, v| mix(h, *v))
}

/// Order-sensitive 64-bit combine with a splitmix64 finaliser; stable across
/// platforms and toolchains, unlike `DefaultHasher`.
fn mix(h: u64, v: u64) -> u64 {
    let mut z = h ^ v
        .wrapping_add(0x9e37_79b9_7f4a_7c15)
        .wrapping_add(h << 6)
        .wrapping_add(h >> 2);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

fn fold(id: u64, n_bits: u32) -> u32 {
    (id % u64::from(n_bits)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_structure_gives_identical_bits() {
        let encoder = MorganEncoder::default();
        let a = encoder.encode("CC(=O)Oc1ccccc1C(=O)O").expect("aspirin");
        let b = encoder.encode("CC(=O)Oc1ccccc1C(=O)O").expect("aspirin again");
        assert_eq!(a, b);
        assert_eq!(a.n_bits(), 2048);
        assert!(a.count_ones() > 5);
    }

    #[test]
    fn different_structures_differ() {
        let encoder = MorganEncoder::default();
        let ethanol = encoder.encode("CCO").expect("ethanol");
        let benzene = encoder.encode("c1ccccc1").expect("benzene");
        assert_ne!(ethanol, benzene);
    }

    #[test]
    fn kekule_and_aromatic_forms_share_a_fingerprint() {
        let encoder = MorganEncoder::default();
        for (kekule, aromatic) in [
            ("CC1=CC=CC=C1", "Cc1ccccc1"),
            ("C1=CC=CC=C1", "c1ccccc1"),
            ("C1=CC=C2C(=C1)C=CN2", "c1ccc2c(c1)cc[nH]2"),
            ("CN1C=NC2=C1C(=O)N(C(=O)N2C)C", "Cn1cnc2c1c(=O)n(c(=O)n2C)C"),
        ] {
            assert_eq!(
                encoder.encode(kekule),
                encoder.encode(aromatic),
                "{kekule} vs {aromatic}"
            );
        }
    }

    #[test]
    fn radius_zero_sets_only_atom_bits() {
        let encoder = MorganEncoder::new(FingerprintParams {
            radius: 0,
            n_bits: 1024,
        })
        .expect("params");
        let methane_like = encoder.encode("C").expect("methane");
        assert_eq!(methane_like.count_ones(), 1);
        let benzene = encoder.encode("c1ccccc1").expect("benzene");
        assert_eq!(benzene.count_ones(), 1, "all six atoms share one invariant");
    }

    #[test]
    fn larger_radius_never_loses_bits() {
        let small = MorganEncoder::new(FingerprintParams {
            radius: 1,
            n_bits: 4096,
        })
        .expect("params");
        let large = MorganEncoder::new(FingerprintParams {
            radius: 3,
            n_bits: 4096,
        })
        .expect("params");
        let s = small.encode("CCN(CC)C(=O)c1ccccc1").expect("r1");
        let l = large.encode("CCN(CC)C(=O)c1ccccc1").expect("r3");
        assert!(s.on_bits().iter().all(|b| l.contains(*b)));
    }

    #[test]
    fn zero_length_fingerprints_are_rejected() {
        assert!(MorganEncoder::new(FingerprintParams {
            radius: 2,
            n_bits: 0
        })
        .is_err());
    }

    #[test]
    fn unparseable_structures_yield_none() {
        let encoder = MorganEncoder::default();
        assert!(encoder.encode("C1CC").is_none());
        assert!(encoder.encode("").is_none());
        assert!(encoder.encode("garbage!").is_none());
    }
}
