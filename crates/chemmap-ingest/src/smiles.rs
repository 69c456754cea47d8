// SPDX-License-Identifier: Apache-2.0

//! Minimal SMILES reader: enough structure (atoms, bonds, hydrogens, ring
//! membership) to derive circular fingerprints, and strict enough to reject
//! strings that do not describe a molecule. Kekulé rings with 4n+2 pi
//! electrons are rewritten in aromatic form, so `C1=CC=CC=C1` and `c1ccccc1`
//! parse to the same molecule.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmilesError {
    Empty,
    UnexpectedChar { pos: usize, ch: char },
    UnknownElement { pos: usize, symbol: String },
    InvalidBracketAtom { pos: usize },
    UnbalancedBranch { pos: usize },
    DanglingBond { pos: usize },
    UnclosedRing { label: u16 },
    RingBondConflict { label: u16 },
    DuplicateBond { pos: usize },
    ValenceExceeded { atom: usize },
    NonRingAromatic { atom: usize },
}

impl Display for SmilesError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty SMILES"),
            Self::UnexpectedChar { pos, ch } => write!(f, "unexpected {ch:?} at {pos}"),
            Self::UnknownElement { pos, symbol } => {
                write!(f, "unknown element {symbol:?} at {pos}")
            }
            Self::InvalidBracketAtom { pos } => write!(f, "invalid bracket atom at {pos}"),
            Self::UnbalancedBranch { pos } => write!(f, "unbalanced branch at {pos}"),
            Self::DanglingBond { pos } => write!(f, "bond without a partner atom at {pos}"),
            Self::UnclosedRing { label } => write!(f, "ring bond {label} is never closed"),
            Self::RingBondConflict { label } => {
                write!(f, "ring bond {label} has conflicting bond orders")
            }
            Self::DuplicateBond { pos } => write!(f, "duplicate bond at {pos}"),
            Self::ValenceExceeded { atom } => write!(f, "valence exceeded on atom {atom}"),
            Self::NonRingAromatic { atom } => {
                write!(f, "aromatic atom {atom} is not in a ring")
            }
        }
    }
}

impl std::error::Error for SmilesError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Quadruple,
    Aromatic,
}

impl BondOrder {
    #[must_use]
    pub fn code(self) -> u64 {
        match self {
            Self::Single => 1,
            Self::Double => 2,
            Self::Triple => 3,
            Self::Quadruple => 4,
            Self::Aromatic => 12,
        }
    }

    fn valence_contribution(self) -> u32 {
        match self {
            Self::Single | Self::Aromatic => 1,
            Self::Double => 2,
            Self::Triple => 3,
            Self::Quadruple => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    pub atomic_number: u8,
    pub aromatic: bool,
    pub isotope: Option<u16>,
    pub charge: i8,
    pub hydrogens: u8,
    pub in_ring: bool,
    bracket: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bond {
    pub a: usize,
    pub b: usize,
    pub order: BondOrder,
    pub in_ring: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Molecule {
    pub atoms: Vec<Atom>,
    pub bonds: Vec<Bond>,
    adjacency: Vec<Vec<(usize, usize)>>,
}

impl Molecule {
    /// Neighbours of `atom` as `(neighbour index, bond index)`.
    #[must_use]
    pub fn neighbors(&self, atom: usize) -> &[(usize, usize)] {
        &self.adjacency[atom]
    }

    #[must_use]
    pub fn degree(&self, atom: usize) -> usize {
        self.adjacency[atom].len()
    }
}

const ELEMENTS: &[&str] = &[
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

fn atomic_number(symbol: &str) -> Option<u8> {
    ELEMENTS
        .iter()
        .position(|e| *e == symbol)
        .and_then(|i| u8::try_from(i + 1).ok())
}

/// Allowed valences of the organic subset, smallest first.
fn default_valences(atomic_number: u8) -> &'static [u32] {
    match atomic_number {
        5 => &[3],
        6 => &[4],
        7 => &[3, 5],
        8 => &[2],
        15 => &[3, 5],
        16 => &[2, 4, 6],
        9 | 17 | 35 | 53 => &[1],
        _ => &[],
    }
}

fn aromatic_allowed(atomic_number: u8) -> bool {
    matches!(atomic_number, 5 | 6 | 7 | 8 | 15 | 16 | 33 | 34 | 52)
}

/// Largest ring considered for aromaticity perception.
const MAX_AROMATIC_RING: usize = 7;

#[derive(Clone, Copy, PartialEq, Eq)]
enum BondSymbol {
    Order(BondOrder),
    /// `/` and `\`: single bonds carrying stereo we do not use.
    Directional,
}

impl BondSymbol {
    fn order(self) -> BondOrder {
        match self {
            Self::Order(o) => o,
            Self::Directional => BondOrder::Single,
        }
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    adjacency: Vec<Vec<(usize, usize)>>,
}

pub fn parse_smiles(input: &str) -> Result<Molecule, SmilesError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SmilesError::Empty);
    }
    let mut parser = Parser {
        chars: trimmed.chars().collect(),
        pos: 0,
        atoms: Vec::new(),
        bonds: Vec::new(),
        adjacency: Vec::new(),
    };
    parser.run()?;
    parser.finish()
}

impl Parser {
    fn run(&mut self) -> Result<(), SmilesError> {
        let mut prev: Option<usize> = None;
        let mut pending: Option<(BondSymbol, usize)> = None;
        let mut branches: Vec<Option<usize>> = Vec::new();
        let mut rings: BTreeMap<u16, (usize, Option<BondSymbol>)> = BTreeMap::new();
        let mut open_dot: Option<usize> = None;

        while self.pos < self.chars.len() {
            let start = self.pos;
            let ch = self.chars[self.pos];
            match ch {
                '(' => {
                    if prev.is_none() || pending.is_some() {
                        return Err(SmilesError::UnbalancedBranch { pos: start });
                    }
                    branches.push(prev);
                    self.pos += 1;
                }
                ')' => {
                    if pending.is_some() {
                        return Err(SmilesError::DanglingBond { pos: start });
                    }
                    prev = branches
                        .pop()
                        .ok_or(SmilesError::UnbalancedBranch { pos: start })?;
                    self.pos += 1;
                }
                '-' | '=' | '#' | '$' | ':' | '/' | '\\' => {
                    if prev.is_none() || pending.is_some() {
                        return Err(SmilesError::DanglingBond { pos: start });
                    }
                    let symbol = match ch {
                        '-' => BondSymbol::Order(BondOrder::Single),
                        '=' => BondSymbol::Order(BondOrder::Double),
                        '#' => BondSymbol::Order(BondOrder::Triple),
                        '$' => BondSymbol::Order(BondOrder::Quadruple),
                        ':' => BondSymbol::Order(BondOrder::Aromatic),
                        _ => BondSymbol::Directional,
                    };
                    pending = Some((symbol, start));
                    self.pos += 1;
                }
                '.' => {
                    if prev.is_none() || pending.is_some() {
                        return Err(SmilesError::UnexpectedChar { pos: start, ch });
                    }
                    prev = None;
                    open_dot = Some(start);
                    self.pos += 1;
                }
                '0'..='9' | '%' => {
                    let atom = prev.ok_or(SmilesError::UnexpectedChar { pos: start, ch })?;
                    let label = self.ring_label()?;
                    let symbol = pending.take().map(|(s, _)| s);
                    match rings.remove(&label) {
                        Some((other, other_symbol)) => {
                            let symbol = match (symbol, other_symbol) {
                                (Some(a), Some(b)) if a.order() != b.order() => {
                                    return Err(SmilesError::RingBondConflict { label });
                                }
                                (Some(a), _) | (None, Some(a)) => Some(a),
                                (None, None) => None,
                            };
                            if other == atom {
                                return Err(SmilesError::DuplicateBond { pos: start });
                            }
                            self.add_bond(other, atom, symbol, start)?;
                        }
                        None => {
                            rings.insert(label, (atom, symbol));
                        }
                    }
                }
                '[' => {
                    let atom = self.bracket_atom()?;
                    self.attach(atom, &mut prev, &mut pending)?;
                    open_dot = None;
                }
                _ => {
                    let atom = self.organic_atom()?;
                    self.attach(atom, &mut prev, &mut pending)?;
                    open_dot = None;
                }
            }
        }

        if let Some((_, pos)) = pending {
            return Err(SmilesError::DanglingBond { pos });
        }
        if let Some(pos) = open_dot {
            return Err(SmilesError::UnexpectedChar { pos, ch: '.' });
        }
        if !branches.is_empty() {
            return Err(SmilesError::UnbalancedBranch {
                pos: self.chars.len(),
            });
        }
        if let Some(label) = rings.keys().next() {
            return Err(SmilesError::UnclosedRing { label: *label });
        }
        if self.atoms.is_empty() {
            return Err(SmilesError::Empty);
        }
        Ok(())
    }

    fn attach(
        &mut self,
        atom: Atom,
        prev: &mut Option<usize>,
        pending: &mut Option<(BondSymbol, usize)>,
    ) -> Result<(), SmilesError> {
        let idx = self.atoms.len();
        self.atoms.push(atom);
        self.adjacency.push(Vec::new());
        if let Some(p) = *prev {
            let symbol = pending.take().map(|(s, _)| s);
            self.add_bond(p, idx, symbol, self.pos)?;
        }
        *prev = Some(idx);
        Ok(())
    }

    fn add_bond(
        &mut self,
        a: usize,
        b: usize,
        symbol: Option<BondSymbol>,
        pos: usize,
    ) -> Result<(), SmilesError> {
        if self.adjacency[a].iter().any(|(n, _)| *n == b) {
            return Err(SmilesError::DuplicateBond { pos });
        }
        let order = match symbol {
            Some(s) => s.order(),
            None if self.atoms[a].aromatic && self.atoms[b].aromatic => BondOrder::Aromatic,
            None => BondOrder::Single,
        };
        let idx = self.bonds.len();
        self.bonds.push(Bond {
            a,
            b,
            order,
            in_ring: false,
        });
        self.adjacency[a].push((b, idx));
        self.adjacency[b].push((a, idx));
        Ok(())
    }

    fn ring_label(&mut self) -> Result<u16, SmilesError> {
        let start = self.pos;
        if self.chars[self.pos] == '%' {
            let digits: Option<(u32, u32)> = self
                .chars
                .get(self.pos + 1)
                .and_then(|c| c.to_digit(10))
                .zip(self.chars.get(self.pos + 2).and_then(|c| c.to_digit(10)));
            let (d1, d2) = digits.ok_or(SmilesError::UnexpectedChar { pos: start, ch: '%' })?;
            self.pos += 3;
            return Ok((d1 * 10 + d2) as u16);
        }
        let d = self.chars[self.pos].to_digit(10).unwrap_or(0);
        self.pos += 1;
        Ok(d as u16)
    }

    fn organic_atom(&mut self) -> Result<Atom, SmilesError> {
        let start = self.pos;
        let ch = self.chars[self.pos];
        let next = self.chars.get(self.pos + 1).copied();
        let (symbol, aromatic, width) = match (ch, next) {
            ('C', Some('l')) => ("Cl", false, 2),
            ('B', Some('r')) => ("Br", false, 2),
            ('B', _) => ("B", false, 1),
            ('C', _) => ("C", false, 1),
            ('N', _) => ("N", false, 1),
            ('O', _) => ("O", false, 1),
            ('P', _) => ("P", false, 1),
            ('S', _) => ("S", false, 1),
            ('F', _) => ("F", false, 1),
            ('I', _) => ("I", false, 1),
            ('b', _) => ("B", true, 1),
            ('c', _) => ("C", true, 1),
            ('n', _) => ("N", true, 1),
            ('o', _) => ("O", true, 1),
            ('p', _) => ("P", true, 1),
            ('s', _) => ("S", true, 1),
            ('*', _) => ("*", false, 1),
            _ => return Err(SmilesError::UnexpectedChar { pos: start, ch }),
        };
        self.pos += width;
        let atomic_number = if symbol == "*" {
            0
        } else {
            atomic_number(symbol).ok_or(SmilesError::UnknownElement {
                pos: start,
                symbol: symbol.to_string(),
            })?
        };
        Ok(Atom {
            atomic_number,
            aromatic,
            isotope: None,
            charge: 0,
            hydrogens: 0,
            in_ring: false,
            bracket: false,
        })
    }

    fn bracket_atom(&mut self) -> Result<Atom, SmilesError> {
        let start = self.pos;
        let invalid = SmilesError::InvalidBracketAtom { pos: start };
        let close = self.chars[start..]
            .iter()
            .position(|c| *c == ']')
            .map(|off| start + off)
            .ok_or(invalid.clone())?;
        let body: Vec<char> = self.chars[start + 1..close].to_vec();
        self.pos = close + 1;
        let mut i = 0;

        let mut isotope: Option<u16> = None;
        while i < body.len() && body[i].is_ascii_digit() {
            let d = body[i].to_digit(10).unwrap_or(0) as u16;
            isotope = Some(
                isotope
                    .unwrap_or(0)
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(d))
                    .ok_or(invalid.clone())?,
            );
            i += 1;
        }

        let (atomic_number, aromatic) = match body.get(i) {
            Some('*') => {
                i += 1;
                (0, false)
            }
            Some(c) if c.is_ascii_uppercase() => {
                let mut symbol = c.to_string();
                if let Some(l) = body.get(i + 1).filter(|l| l.is_ascii_lowercase()) {
                    let two = format!("{c}{l}");
                    if atomic_number(&two).is_some() {
                        symbol = two;
                    }
                }
                i += symbol.len();
                let z = atomic_number(&symbol).ok_or(SmilesError::UnknownElement {
                    pos: start,
                    symbol: symbol.clone(),
                })?;
                (z, false)
            }
            Some(c) if c.is_ascii_lowercase() => {
                let two: String = body[i..body.len().min(i + 2)].iter().collect();
                let symbol = if matches!(two.as_str(), "se" | "as" | "te") {
                    two
                } else {
                    c.to_string()
                };
                i += symbol.len();
                let mut upper = symbol.clone();
                upper[..1].make_ascii_uppercase();
                let z = atomic_number(&upper)
                    .filter(|z| aromatic_allowed(*z))
                    .ok_or(SmilesError::UnknownElement {
                        pos: start,
                        symbol: symbol.clone(),
                    })?;
                (z, true)
            }
            _ => return Err(invalid),
        };

        if body.get(i) == Some(&'@') {
            i += 1;
            if body.get(i) == Some(&'@') {
                i += 1;
            } else {
                while i < body.len() && body[i].is_ascii_uppercase() && body[i] != 'H' {
                    i += 1;
                }
                while i < body.len() && body[i].is_ascii_digit() {
                    i += 1;
                }
            }
        }

        let mut hydrogens = 0_u8;
        if body.get(i) == Some(&'H') {
            i += 1;
            hydrogens = 1;
            if let Some(d) = body.get(i).and_then(|c| c.to_digit(10)) {
                hydrogens = d as u8;
                i += 1;
            }
        }

        let mut charge: i8 = 0;
        if let Some(&sign_ch) = body.get(i).filter(|c| **c == '+' || **c == '-') {
            let sign: i8 = if sign_ch == '+' { 1 } else { -1 };
            i += 1;
            let mut magnitude: i8 = 1;
            if let Some(d) = body.get(i).and_then(|c| c.to_digit(10)) {
                magnitude = d as i8;
                i += 1;
                if let Some(d2) = body.get(i).and_then(|c| c.to_digit(10)) {
                    magnitude = magnitude * 10 + d2 as i8;
                    i += 1;
                }
            } else {
                while body.get(i) == Some(&sign_ch) {
                    magnitude += 1;
                    i += 1;
                }
            }
            charge = sign * magnitude;
        }

        if body.get(i) == Some(&':') {
            i += 1;
            let digits_start = i;
            while i < body.len() && body[i].is_ascii_digit() {
                i += 1;
            }
            if i == digits_start {
                return Err(invalid);
            }
        }

        if i != body.len() {
            return Err(invalid);
        }

        Ok(Atom {
            atomic_number,
            aromatic,
            isotope,
            charge,
            hydrogens,
            in_ring: false,
            bracket: true,
        })
    }

    fn finish(mut self) -> Result<Molecule, SmilesError> {
        let ring_bonds = non_bridge_bonds(&self.adjacency, self.bonds.len());
        for (idx, bond) in self.bonds.iter_mut().enumerate() {
            bond.in_ring = ring_bonds[idx];
            if bond.in_ring {
                self.atoms[bond.a].in_ring = true;
                self.atoms[bond.b].in_ring = true;
            }
        }

        for (idx, atom) in self.atoms.iter().enumerate() {
            if atom.aromatic && !atom.in_ring {
                return Err(SmilesError::NonRingAromatic { atom: idx });
            }
        }

        for idx in 0..self.atoms.len() {
            let atom = &self.atoms[idx];
            if atom.bracket || atom.atomic_number == 0 {
                continue;
            }
            let used: u32 = self.adjacency[idx]
                .iter()
                .map(|(_, b)| self.bonds[*b].order.valence_contribution())
                .sum();
            let valences = default_valences(atom.atomic_number);
            let max = valences.last().copied().unwrap_or(0);
            let hydrogens = if atom.aromatic {
                // One valence goes to the pi system unless the atom donates a
                // lone pair instead (pyrrole-type n, furan o, thiophene s).
                let base = valences.first().copied().unwrap_or(0);
                if used + 1 <= base {
                    base - used - 1
                } else if used <= max {
                    0
                } else {
                    return Err(SmilesError::ValenceExceeded { atom: idx });
                }
            } else {
                let target = valences
                    .iter()
                    .copied()
                    .find(|v| *v >= used)
                    .ok_or(SmilesError::ValenceExceeded { atom: idx })?;
                target - used
            };
            self.atoms[idx].hydrogens = u8::try_from(hydrogens).unwrap_or(0);
        }

        aromatize(&mut self.atoms, &mut self.bonds, &self.adjacency);

        Ok(Molecule {
            atoms: self.atoms,
            bonds: self.bonds,
            adjacency: self.adjacency,
        })
    }
}

/// Rewrites Kekulé rings that satisfy the 4n+2 rule as aromatic. Fused
/// systems are handled by repeating until no ring changes: once one ring is
/// aromatic, its shared bonds count towards the neighbouring ring.
fn aromatize(atoms: &mut [Atom], bonds: &mut [Bond], adjacency: &[Vec<(usize, usize)>]) {
    let rings = small_rings(atoms, bonds, adjacency);
    let mut done = vec![false; rings.len()];
    loop {
        let mut changed = false;
        for (r, ring) in rings.iter().enumerate() {
            if done[r] {
                continue;
            }
            if ring.bonds.iter().all(|b| bonds[*b].order == BondOrder::Aromatic) {
                done[r] = true;
                continue;
            }
            let electrons: Option<u32> = ring
                .atoms
                .iter()
                .map(|a| pi_electrons(*a, &ring.bonds, atoms, bonds, adjacency))
                .sum();
            if electrons.is_some_and(|e| e % 4 == 2) {
                for a in &ring.atoms {
                    atoms[*a].aromatic = true;
                }
                for b in &ring.bonds {
                    bonds[*b].order = BondOrder::Aromatic;
                }
                done[r] = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

struct Ring {
    atoms: Vec<usize>,
    bonds: Vec<usize>,
}

/// Smallest ring through each ring bond, deduplicated, limited to rings of
/// aromatic-capable elements no larger than `MAX_AROMATIC_RING`.
fn small_rings(atoms: &[Atom], bonds: &[Bond], adjacency: &[Vec<(usize, usize)>]) -> Vec<Ring> {
    let mut seen: BTreeSet<Vec<usize>> = BTreeSet::new();
    let mut rings = Vec::new();
    for (idx, bond) in bonds.iter().enumerate() {
        if !bond.in_ring {
            continue;
        }
        let Some(path) = shortest_path_avoiding(bond.a, bond.b, idx, adjacency) else {
            continue;
        };
        if path.len() > MAX_AROMATIC_RING
            || path.iter().any(|a| !aromatic_allowed(atoms[*a].atomic_number))
        {
            continue;
        }
        let mut key = path.clone();
        key.sort_unstable();
        if !seen.insert(key) {
            continue;
        }
        let mut ring_bonds = vec![idx];
        for pair in path.windows(2) {
            if let Some((_, b)) = adjacency[pair[0]].iter().find(|(n, _)| *n == pair[1]) {
                ring_bonds.push(*b);
            }
        }
        rings.push(Ring {
            atoms: path,
            bonds: ring_bonds,
        });
    }
    rings
}

/// Breadth-first path `from` to `to` that does not use bond `skip`.
fn shortest_path_avoiding(
    from: usize,
    to: usize,
    skip: usize,
    adjacency: &[Vec<(usize, usize)>],
) -> Option<Vec<usize>> {
    let mut parent = vec![usize::MAX; adjacency.len()];
    parent[from] = from;
    let mut queue = VecDeque::from([from]);
    while let Some(u) = queue.pop_front() {
        if u == to {
            let mut path = vec![to];
            let mut cur = to;
            while cur != from {
                cur = parent[cur];
                path.push(cur);
            }
            return Some(path);
        }
        for (v, b) in &adjacency[u] {
            if *b != skip && parent[*v] == usize::MAX {
                parent[*v] = u;
                queue.push_back(*v);
            }
        }
    }
    None
}

/// Pi electrons `atom` donates to the ring made of `ring_bonds`, or `None`
/// when the atom rules the ring out (sp3 carbon, triple bond, exocyclic
/// carbon double bond).
fn pi_electrons(
    atom: usize,
    ring_bonds: &[usize],
    atoms: &[Atom],
    bonds: &[Bond],
    adjacency: &[Vec<(usize, usize)>],
) -> Option<u32> {
    let mut endocyclic = false;
    let mut exocyclic_hetero = false;
    for (nbr, b) in &adjacency[atom] {
        let in_this_ring = ring_bonds.contains(b);
        match bonds[*b].order {
            BondOrder::Double | BondOrder::Aromatic if in_this_ring => endocyclic = true,
            BondOrder::Double if matches!(atoms[*nbr].atomic_number, 7 | 8 | 16) => {
                exocyclic_hetero = true;
            }
            BondOrder::Double | BondOrder::Triple | BondOrder::Quadruple => return None,
            BondOrder::Single | BondOrder::Aromatic => {}
        }
    }
    let a = &atoms[atom];
    let lone_pair = a.charge == 0
        && match a.atomic_number {
            7 | 15 => adjacency[atom].len() + usize::from(a.hydrogens) == 3,
            8 | 16 | 34 => adjacency[atom].len() + usize::from(a.hydrogens) == 2,
            _ => false,
        };
    if exocyclic_hetero {
        Some(0)
    } else if lone_pair && !has_ring_double(atom, ring_bonds, bonds, adjacency) {
        Some(2)
    } else if endocyclic {
        Some(1)
    } else {
        None
    }
}

fn has_ring_double(
    atom: usize,
    ring_bonds: &[usize],
    bonds: &[Bond],
    adjacency: &[Vec<(usize, usize)>],
) -> bool {
    adjacency[atom]
        .iter()
        .any(|(_, b)| ring_bonds.contains(b) && bonds[*b].order == BondOrder::Double)
}

/// Marks every bond that lies on a cycle (i.e. is not a bridge).
fn non_bridge_bonds(adjacency: &[Vec<(usize, usize)>], n_bonds: usize) -> Vec<bool> {
    let n = adjacency.len();
    let mut disc = vec![usize::MAX; n];
    let mut low = vec![0_usize; n];
    let mut in_ring = vec![true; n_bonds];
    let mut timer = 0_usize;

    for root in 0..n {
        if disc[root] != usize::MAX {
            continue;
        }
        disc[root] = timer;
        low[root] = timer;
        timer += 1;
        let mut stack: Vec<(usize, Option<usize>, usize)> = vec![(root, None, 0)];

        while let Some(top) = stack.last_mut() {
            let (u, parent_bond) = (top.0, top.1);
            if top.2 < adjacency[u].len() {
                let (v, b) = adjacency[u][top.2];
                top.2 += 1;
                if Some(b) == parent_bond {
                    continue;
                }
                if disc[v] == usize::MAX {
                    disc[v] = timer;
                    low[v] = timer;
                    timer += 1;
                    stack.push((v, Some(b), 0));
                } else {
                    low[u] = low[u].min(disc[v]);
                }
            } else {
                stack.pop();
                if let (Some(b), Some(parent)) = (parent_bond, stack.last()) {
                    let p = parent.0;
                    low[p] = low[p].min(low[u]);
                    if low[u] > disc[p] {
                        in_ring[b] = false;
                    }
                }
            }
        }
    }
    in_ring
}
