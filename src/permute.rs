/// Keyed permutation of DCT blocks and coefficients
/// Every operation here has an exact inverse driven by the same chaos values
use crate::chaos::{permutation_of, ChaosBackend, ChaosValue, LogisticMap};
use crate::coefficients::{read_column, write_column, Block, BlockAccess, DCTSIZE2};
use crate::decimal::Decimal;
use crate::error::{CryptoError, Result};
use crate::signs::derive_sign_flips;
use tracing::{debug, error};

/// How a permutation is applied to a slice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermuteMode {
    /// In-place cycle following: the element at `i` moves to `perm[i]`
    Swap,
    /// Copy through scratch: `items[i] = old[perm[i]]`
    Gather,
}

impl PermuteMode {
    /// The mode that undoes this one for the same `perm`
    pub fn inverse(self) -> Self {
        match self {
            PermuteMode::Swap => PermuteMode::Gather,
            PermuteMode::Gather => PermuteMode::Swap,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// Empty vector with room for `len` elements, or `ScratchAlloc`.
pub(crate) fn try_scratch<T>(len: usize) -> Result<Vec<T>> {
    let mut scratch = Vec::new();
    scratch
        .try_reserve_exact(len)
        .map_err(|_| CryptoError::ScratchAlloc { len })?;
    Ok(scratch)
}

/// Log a scratch allocation failure and carry on; other errors pass through.
fn skip_on_scratch_failure(result: Result<()>, scope: &str) -> Result<()> {
    match result {
        Err(CryptoError::ScratchAlloc { len }) => {
            error!(len, "scratch allocation failed, leaving {scope} unpermuted");
            Ok(())
        }
        other => other,
    }
}

/// Check that `perm` is a bijection on `0..len`.
pub fn validate_permutation(perm: &[usize], len: usize) -> Result<()> {
    if perm.len() != len {
        return Err(CryptoError::InvalidPermutation(format!(
            "permutation has {} entries for {} items",
            perm.len(),
            len
        )));
    }
    let mut seen: Vec<bool> = try_scratch(len)?;
    seen.resize(len, false);
    for &p in perm {
        if p >= len {
            return Err(CryptoError::InvalidPermutation(format!(
                "index {p} out of range for {len} items"
            )));
        }
        if seen[p] {
            return Err(CryptoError::InvalidPermutation(format!("index {p} repeated")));
        }
        seen[p] = true;
    }
    Ok(())
}

/// Reorder `items` by `perm`.
pub fn apply_permutation<T: Clone>(items: &mut [T], perm: &[usize], mode: PermuteMode) -> Result<()> {
    validate_permutation(perm, items.len())?;
    match mode {
        PermuteMode::Swap => {
            let mut placed: Vec<bool> = try_scratch(items.len())?;
            placed.resize(items.len(), false);
            for start in 0..items.len() {
                if placed[start] {
                    continue;
                }
                // items[start] carries the displaced element around the cycle
                let mut next = perm[start];
                while next != start {
                    items.swap(start, next);
                    placed[next] = true;
                    next = perm[next];
                }
                placed[start] = true;
            }
        }
        PermuteMode::Gather => {
            let mut copy = try_scratch(items.len())?;
            copy.extend_from_slice(items);
            for (item, &src) in items.iter_mut().zip(perm) {
                *item = copy[src].clone();
            }
        }
    }
    Ok(())
}

/// Undo `apply_permutation(items, perm, mode)`.
pub fn apply_inverse<T: Clone>(items: &mut [T], perm: &[usize], mode: PermuteMode) -> Result<()> {
    apply_permutation(items, perm, mode.inverse())
}

fn apply_directed<T: Clone>(
    items: &mut [T],
    perm: &[usize],
    mode: PermuteMode,
    direction: Direction,
) -> Result<()> {
    match direction {
        Direction::Encrypt => apply_permutation(items, perm, mode),
        Direction::Decrypt => apply_inverse(items, perm, mode),
    }
}

/// Maximal runs of DC values with the same sign (negative vs. non-negative)
pub fn same_sign_windows(dcs: &[i16]) -> Vec<(usize, usize)> {
    let mut windows = Vec::new();
    let mut start = 0;
    for i in 1..=dcs.len() {
        if i == dcs.len() || (dcs[i] < 0) != (dcs[start] < 0) {
            windows.push((start, i));
            start = i;
        }
    }
    windows
}

/// Shuffle DC coefficients inside each same-sign window of every block row.
///
/// Signs never move, so decryption finds the same windows in the scrambled
/// row. Windows of length 1 consume no chaos values.
pub fn permute_dc_windows<S, B>(store: &mut S, map: &mut LogisticMap<B>, direction: Direction) -> Result<()>
where
    S: BlockAccess + ?Sized,
    B: ChaosBackend,
{
    for component in 0..store.num_components() {
        let (width, height) = store.dimensions(component);
        for y in 0..height {
            let row = store.row_mut(component, y);
            let mut dcs: Vec<i16> = row.iter().map(|b| b[0]).collect();

            for (start, end) in same_sign_windows(&dcs) {
                if end - start < 2 {
                    continue;
                }
                let perm = map.take_permutation(end - start)?;
                skip_on_scratch_failure(
                    apply_directed(&mut dcs[start..end], &perm, PermuteMode::Gather, direction),
                    "DC window",
                )?;
            }

            for (block, dc) in row.iter_mut().zip(&dcs) {
                block[0] = *dc;
            }
        }
        debug!(component, width, height, "DC windows permuted");
    }
    Ok(())
}

/// Permute all DC coefficients of each component in raster order, flipping
/// the sign of those whose sorted chaos value carries a set flag.
pub fn permute_dc_global<S, B>(
    store: &mut S,
    map: &mut LogisticMap<B>,
    x0: &Decimal,
    mu: &Decimal,
    direction: Direction,
) -> Result<()>
where
    S: BlockAccess + ?Sized,
    B: ChaosBackend,
{
    for component in 0..store.num_components() {
        let (width, height) = store.dimensions(component);
        let n = width * height;
        if n == 0 {
            continue;
        }

        let mut seq = map.take_sorted(n)?;
        for (value, flip) in seq.iter_mut().zip(derive_sign_flips(x0, mu, n)) {
            value.sign_flip = flip;
        }
        let perm = permutation_of(&seq);

        let result = try_scratch::<i16>(n).and_then(|mut dcs| {
            for y in 0..height {
                dcs.extend(store.row(component, y).iter().map(|b| b[0]));
            }
            match direction {
                Direction::Encrypt => {
                    apply_permutation(&mut dcs, &perm, PermuteMode::Gather)?;
                    flip_signs(&mut dcs, &seq);
                }
                Direction::Decrypt => {
                    flip_signs(&mut dcs, &seq);
                    apply_inverse(&mut dcs, &perm, PermuteMode::Gather)?;
                }
            }
            for (y, chunk) in dcs.chunks_exact(width).enumerate() {
                for (block, dc) in store.row_mut(component, y).iter_mut().zip(chunk) {
                    block[0] = *dc;
                }
            }
            Ok(())
        });
        skip_on_scratch_failure(result, "DC component")?;
        debug!(component, blocks = n, "DC coefficients permuted globally");
    }
    Ok(())
}

// Negation is its own inverse, including for i16::MIN.
fn flip_signs<B>(dcs: &mut [i16], seq: &[ChaosValue<B>]) {
    for (dc, value) in dcs.iter_mut().zip(seq) {
        if value.sign_flip {
            *dc = dc.wrapping_neg();
        }
    }
}

/// Shuffle whole blocks within each block row; the map chains across rows.
pub fn permute_mcu_rows<S, B>(store: &mut S, map: &mut LogisticMap<B>, direction: Direction) -> Result<()>
where
    S: BlockAccess + ?Sized,
    B: ChaosBackend,
{
    for component in 0..store.num_components() {
        let (width, height) = store.dimensions(component);
        if width == 0 {
            continue;
        }
        for y in 0..height {
            let perm = map.take_permutation(width)?;
            skip_on_scratch_failure(
                apply_directed(store.row_mut(component, y), &perm, PermuteMode::Swap, direction),
                "block row",
            )?;
        }
        debug!(component, rows = height, "block rows permuted");
    }
    Ok(())
}

/// Shuffle whole blocks within each block column.
pub fn permute_mcu_columns<S, B>(store: &mut S, map: &mut LogisticMap<B>, direction: Direction) -> Result<()>
where
    S: BlockAccess + ?Sized,
    B: ChaosBackend,
{
    for component in 0..store.num_components() {
        let (width, height) = store.dimensions(component);
        if height == 0 {
            continue;
        }
        for x in 0..width {
            let perm = map.take_permutation(height)?;
            let result = try_scratch::<Block>(height).and_then(|mut column| {
                read_column(&*store, component, x, &mut column);
                apply_directed(&mut column, &perm, PermuteMode::Swap, direction)?;
                write_column(&mut *store, component, x, &column);
                Ok(())
            });
            skip_on_scratch_failure(result, "block column")?;
        }
        debug!(component, columns = width, "block columns permuted");
    }
    Ok(())
}

/// Shuffle every block of a component in raster order with one permutation.
pub fn permute_mcu_whole<S, B>(store: &mut S, map: &mut LogisticMap<B>, direction: Direction) -> Result<()>
where
    S: BlockAccess + ?Sized,
    B: ChaosBackend,
{
    for component in 0..store.num_components() {
        let (width, height) = store.dimensions(component);
        let n = width * height;
        if n == 0 {
            continue;
        }
        let perm = map.take_permutation(n)?;
        let result = try_scratch::<Block>(n).and_then(|mut blocks| {
            for y in 0..height {
                blocks.extend_from_slice(store.row(component, y));
            }
            apply_directed(&mut blocks, &perm, PermuteMode::Swap, direction)?;
            for (y, chunk) in blocks.chunks_exact(width).enumerate() {
                store.row_mut(component, y).copy_from_slice(chunk);
            }
            Ok(())
        });
        skip_on_scratch_failure(result, "component")?;
        debug!(component, blocks = n, "component blocks permuted");
    }
    Ok(())
}

/// Shuffle the non-zero AC values of each block among their own positions.
///
/// The zero/non-zero pattern of a block is unchanged, so both directions
/// see the same slot count. Blocks with fewer than two non-zero ACs are
/// skipped without consuming chaos values.
pub fn permute_nonzero_acs<S, B>(store: &mut S, map: &mut LogisticMap<B>, direction: Direction) -> Result<()>
where
    S: BlockAccess + ?Sized,
    B: ChaosBackend,
{
    let mut positions = [0usize; DCTSIZE2 - 1];
    let mut values = [0i16; DCTSIZE2 - 1];

    for component in 0..store.num_components() {
        let (_, height) = store.dimensions(component);
        for y in 0..height {
            for block in store.row_mut(component, y).iter_mut() {
                let mut count = 0;
                for (i, &coef) in block.iter().enumerate().skip(1) {
                    if coef != 0 {
                        positions[count] = i;
                        values[count] = coef;
                        count += 1;
                    }
                }
                if count < 2 {
                    continue;
                }

                let perm = map.take_permutation(count)?;
                skip_on_scratch_failure(
                    apply_directed(&mut values[..count], &perm, PermuteMode::Gather, direction),
                    "AC block",
                )?;
                for (&pos, &value) in positions[..count].iter().zip(&values[..count]) {
                    block[pos] = value;
                }
            }
        }
        debug!(component, "non-zero AC coefficients permuted");
    }
    Ok(())
}

/// Number of chaos values [`permute_mcu_rows`] draws for `store`.
pub fn row_permutation_len<S: BlockAccess + ?Sized>(store: &S) -> usize {
    (0..store.num_components())
        .map(|c| store.block_count(c))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::{CoefficientImage, Component};

    fn image_with_dcs(width: usize, height: usize, dcs: &[i16]) -> CoefficientImage {
        let blocks = dcs
            .iter()
            .enumerate()
            .map(|(i, &dc)| {
                let mut b = [0i16; DCTSIZE2];
                b[0] = dc;
                b[1] = i as i16 + 1;
                b[10] = -(i as i16) - 1;
                b
            })
            .collect();
        CoefficientImage::new(vec![Component::from_blocks(width, height, blocks).unwrap()])
    }

    fn textured_image() -> CoefficientImage {
        let mut luma = Component::new(5, 4);
        let mut chroma = Component::new(3, 2);
        for (c, comp) in [&mut luma, &mut chroma].into_iter().enumerate() {
            for y in 0..comp.height_in_blocks() {
                for x in 0..comp.width_in_blocks() {
                    let block = comp.block_mut(x, y);
                    for (i, coef) in block.iter_mut().enumerate() {
                        let v = (x * 31 + y * 17 + i * 7 + c * 3) % 23;
                        *coef = if v < 9 { 0 } else { v as i16 - 15 };
                    }
                }
            }
        }
        CoefficientImage::new(vec![luma, chroma])
    }

    fn map() -> LogisticMap<f32> {
        LogisticMap::new(0.555_555_6, 3.577_777_8)
    }

    #[test]
    fn test_swap_and_gather_semantics() {
        let perm = [1, 3, 2, 0];

        let mut swapped = vec!['a', 'b', 'c', 'd'];
        apply_permutation(&mut swapped, &perm, PermuteMode::Swap).unwrap();
        // element from position i lands at perm[i]
        assert_eq!(swapped, vec!['d', 'a', 'c', 'b']);

        let mut gathered = vec!['a', 'b', 'c', 'd'];
        apply_permutation(&mut gathered, &perm, PermuteMode::Gather).unwrap();
        assert_eq!(gathered, vec!['b', 'd', 'c', 'a']);
    }

    #[test]
    fn test_inverse_restores() {
        let perm = map().take_permutation(50).unwrap();
        let original: Vec<u32> = (100..150).collect();
        for mode in [PermuteMode::Swap, PermuteMode::Gather] {
            let mut items = original.clone();
            apply_permutation(&mut items, &perm, mode).unwrap();
            assert_ne!(items, original);
            apply_inverse(&mut items, &perm, mode).unwrap();
            assert_eq!(items, original);
        }
    }

    #[test]
    fn test_invalid_permutations_rejected() {
        let mut items = [1, 2, 3];
        let bad_perms: [&[usize]; 3] = [&[0, 1], &[0, 1, 3], &[0, 0, 1]];
        for bad in bad_perms {
            assert!(matches!(
                apply_permutation(&mut items, bad, PermuteMode::Swap),
                Err(CryptoError::InvalidPermutation(_))
            ));
        }
        assert_eq!(items, [1, 2, 3]);
    }

    #[test]
    fn test_concrete_dc_scenario() {
        let mut map = LogisticMap::new(0.5f32, 3.57f32);
        let perm = map.take_permutation(4).unwrap();
        assert_eq!(perm, vec![1, 3, 2, 0]);

        let mut dcs = vec![10i16, -5, 7, -2];
        apply_permutation(&mut dcs, &perm, PermuteMode::Gather).unwrap();
        assert_eq!(dcs, vec![-5, -2, 7, 10]);
        apply_inverse(&mut dcs, &perm, PermuteMode::Gather).unwrap();
        assert_eq!(dcs, vec![10, -5, 7, -2]);
    }

    #[test]
    fn test_dc_global_scenario_with_flips() {
        let x0: Decimal = "0.5".parse().unwrap();
        let mu: Decimal = "3.57".parse().unwrap();
        let mut image = image_with_dcs(2, 2, &[10, -5, 7, -2]);
        let original = image.clone();

        let mut map = LogisticMap::new(x0.clone(), mu.clone());
        permute_dc_global(&mut image, &mut map, &x0, &mu, Direction::Encrypt).unwrap();

        let flips = derive_sign_flips(&x0, &mu, 4);
        let expected: Vec<i16> = [-5i16, -2, 7, 10]
            .iter()
            .zip(&flips)
            .map(|(&dc, &flip)| if flip { -dc } else { dc })
            .collect();
        assert_eq!(image.component(0).dc_values(), expected);

        let mut map = LogisticMap::new(x0.clone(), mu.clone());
        permute_dc_global(&mut image, &mut map, &x0, &mu, Direction::Decrypt).unwrap();
        assert_eq!(image, original);
    }

    #[test]
    fn test_windows_split_on_sign() {
        assert_eq!(
            same_sign_windows(&[3, 5, -1, -4, -6, 0, 2]),
            vec![(0, 2), (2, 5), (5, 7)]
        );
        assert_eq!(same_sign_windows(&[-1]), vec![(0, 1)]);
        assert!(same_sign_windows(&[]).is_empty());
    }

    #[test]
    fn test_dc_windows_preserve_signs_and_round_trip() {
        let dcs: Vec<i16> = vec![3, 5, 9, -1, -4, -6, -8, 2, 0, 11, 13, -7];
        let mut image = image_with_dcs(6, 2, &dcs);
        let original = image.clone();

        permute_dc_windows(&mut image, &mut map(), Direction::Encrypt).unwrap();
        let scrambled = image.component(0).dc_values();
        for (a, b) in scrambled.iter().zip(&dcs) {
            assert_eq!(*a < 0, *b < 0);
        }
        // windows only exchange values among themselves
        let mut sorted_a = scrambled.clone();
        let mut sorted_b = dcs.clone();
        sorted_a.sort();
        sorted_b.sort();
        assert_eq!(sorted_a, sorted_b);

        permute_dc_windows(&mut image, &mut map(), Direction::Decrypt).unwrap();
        assert_eq!(image, original);
    }

    #[test]
    fn test_mcu_rows_and_columns_round_trip() {
        let original = textured_image();
        let mut image = original.clone();

        permute_mcu_rows(&mut image, &mut map(), Direction::Encrypt).unwrap();
        permute_mcu_columns(&mut image, &mut map(), Direction::Encrypt).unwrap();
        assert_ne!(image, original);

        permute_mcu_columns(&mut image, &mut map(), Direction::Decrypt).unwrap();
        permute_mcu_rows(&mut image, &mut map(), Direction::Decrypt).unwrap();
        assert_eq!(image, original);
    }

    #[test]
    fn test_mcu_rows_keep_blocks_in_their_row() {
        let original = textured_image();
        let mut image = original.clone();
        permute_mcu_rows(&mut image, &mut map(), Direction::Encrypt).unwrap();

        for y in 0..4 {
            let mut before = original.row(0, y).to_vec();
            let mut after = image.row(0, y).to_vec();
            before.sort();
            after.sort();
            assert_eq!(before, after);
        }
    }

    #[test]
    fn test_mcu_whole_round_trip() {
        let original = textured_image();
        let mut image = original.clone();
        permute_mcu_whole(&mut image, &mut map(), Direction::Encrypt).unwrap();
        assert_ne!(image, original);
        permute_mcu_whole(&mut image, &mut map(), Direction::Decrypt).unwrap();
        assert_eq!(image, original);
    }

    #[test]
    fn test_nonzero_acs_keep_zero_pattern() {
        let original = textured_image();
        let mut image = original.clone();
        permute_nonzero_acs(&mut image, &mut map(), Direction::Encrypt).unwrap();
        assert_ne!(image, original);

        for (a, b) in image.components()[0].blocks().iter().zip(original.components()[0].blocks()) {
            assert_eq!(a[0], b[0]);
            for i in 1..DCTSIZE2 {
                assert_eq!(a[i] == 0, b[i] == 0);
            }
        }

        permute_nonzero_acs(&mut image, &mut map(), Direction::Decrypt).unwrap();
        assert_eq!(image, original);
    }

    #[test]
    fn test_row_permutation_len() {
        assert_eq!(row_permutation_len(&textured_image()), 20 + 6);
    }
}
