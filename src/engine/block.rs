use crate::metainfo::Metainfo;
use crate::wire::BLOCK_SIZE;

/// A single requested (or to-be-requested) block within a piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub index: u32,
    pub begin: u32,
    pub length: u32,
}

/// Derives the block-level layout of a torrent from its metainfo: how many
/// `2^14`-byte blocks each piece breaks into, and the full list of block
/// requests needed to fetch the whole file.
#[derive(Debug, Clone, Copy)]
pub struct BlockPlan {
    piece_length: u64,
    file_length: u64,
    piece_count: usize,
}

impl BlockPlan {
    pub fn from_metainfo(meta: &Metainfo) -> Self {
        BlockPlan {
            piece_length: meta.info.piece_length,
            file_length: meta.info.length,
            piece_count: meta.piece_count(),
        }
    }

    pub fn piece_count(&self) -> usize {
        self.piece_count
    }

    /// Blocks in a full-size piece. Piece lengths are expected to be a
    /// multiple of `BLOCK_SIZE` (they're a power of two in practice, per
    /// BEP 3 convention), so this is exact.
    pub fn blocks_per_piece(&self) -> u32 {
        (self.piece_length / BLOCK_SIZE as u64) as u32
    }

    fn piece_size(&self, index: usize) -> u64 {
        if index + 1 == self.piece_count {
            self.file_length - self.piece_length * (self.piece_count as u64 - 1)
        } else {
            self.piece_length
        }
    }

    /// The number of blocks piece `index` is split into — `blocks_per_piece`
    /// for every piece except possibly the last, whose size may not be a
    /// multiple of `BLOCK_SIZE`.
    pub fn block_count_for_piece(&self, index: usize) -> usize {
        let size = self.piece_size(index);
        let full = size / BLOCK_SIZE as u64;
        let remainder = size % BLOCK_SIZE as u64;
        full as usize + if remainder != 0 { 1 } else { 0 }
    }

    /// Every block of piece `index`, in ascending `begin` order.
    pub fn blocks_for_piece(&self, index: usize) -> Vec<Block> {
        let size = self.piece_size(index);
        let full_blocks = size / BLOCK_SIZE as u64;
        let remainder = size % BLOCK_SIZE as u64;

        let mut blocks = Vec::with_capacity(full_blocks as usize + 1);
        for b in 0..full_blocks {
            blocks.push(Block {
                index: index as u32,
                begin: (b * BLOCK_SIZE as u64) as u32,
                length: BLOCK_SIZE,
            });
        }
        if remainder != 0 {
            blocks.push(Block {
                index: index as u32,
                begin: (full_blocks * BLOCK_SIZE as u64) as u32,
                length: remainder as u32,
            });
        }
        blocks
    }

    /// Every block request needed to fetch the entire file, piece by piece
    /// in order — what a leech session enqueues immediately on connecting.
    pub fn request_all(&self) -> Vec<Block> {
        (0..self.piece_count)
            .flat_map(|index| self.blocks_for_piece(index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bencode::value::Dict;
    use crate::bencode::BencodeValue;
    use crate::metainfo::from_bencode;

    fn metainfo_with(piece_length: u64, length: u64) -> Metainfo {
        let piece_count = length.div_ceil(piece_length) as usize;
        let pieces = vec![0u8; piece_count * 20];
        let info: Dict = vec![
            (b"name".to_vec(), BencodeValue::String("f".to_string())),
            (
                b"piece length".to_vec(),
                BencodeValue::Integer(piece_length as i64),
            ),
            (b"length".to_vec(), BencodeValue::Integer(length as i64)),
            (b"pieces".to_vec(), BencodeValue::Bytes(pieces)),
        ];
        let top: Dict = vec![
            (b"announce".to_vec(), BencodeValue::String(String::new())),
            (b"info".to_vec(), BencodeValue::Dictionary(info)),
        ];
        from_bencode(&BencodeValue::Dictionary(top)).unwrap()
    }

    #[test]
    fn s6_block_plan_counts() {
        let meta = metainfo_with(1 << 18, (1 << 20) + 5);
        let plan = BlockPlan::from_metainfo(&meta);

        assert_eq!(plan.piece_count(), 5);
        assert_eq!(plan.blocks_per_piece(), 16);
        assert_eq!(plan.piece_size(4), 5);

        let last_piece_blocks = plan.blocks_for_piece(4);
        assert_eq!(last_piece_blocks.len(), 1);
        assert_eq!(last_piece_blocks[0].length, 5);
        assert_eq!(last_piece_blocks[0].begin, 0);

        let all = plan.request_all();
        assert_eq!(all.len(), 4 * 16 + 1);
    }

    #[test]
    fn exact_multiple_of_block_size_has_no_short_tail() {
        let meta = metainfo_with(1 << 14, 1 << 15); // 2 full pieces, each 1 block
        let plan = BlockPlan::from_metainfo(&meta);
        assert_eq!(plan.piece_count(), 2);
        assert_eq!(plan.block_count_for_piece(0), 1);
        assert_eq!(plan.block_count_for_piece(1), 1);
        assert_eq!(plan.request_all().len(), 2);
    }
}
