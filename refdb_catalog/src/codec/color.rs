use super::{read_str, write_str, Reader, Result, TableRecord, Writer, COLORS_CHUNK};
use crate::keys::{ColorId, ColorType};
use crate::records::Color;
use crate::version::Version;
use refdb_arena::Arena;
use refdb_chunk::ChunkId;
use std::io::{Read, Seek, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Layout {
    V6,
    /// LDraw edge color and luminance
    V9,
}

impl Layout {
    fn for_version(version: Version) -> Self {
        match version {
            Version::V6 | Version::V7 | Version::V8 => Self::V6,
            Version::V9 | Version::V10 | Version::V11 | Version::V12 => Self::V9,
        }
    }
}

impl TableRecord for Color {
    const CHUNK_ID: ChunkId = COLORS_CHUNK;
    const MIN_WIRE_SIZE: u64 = 28;

    fn decode<R: Read + Seek>(
        r: &mut Reader<R>,
        arena: &mut Arena,
        version: Version,
    ) -> Result<Self> {
        let layout = Layout::for_version(version);

        let mut color = Self::new(
            ColorId::new(r.read_u32()?),
            read_str(r, arena, "color name")?,
        );
        color.ldraw_id = r.read_i32()?;
        color.rgb = r.read_u32()?;
        color.type_flags = ColorType::from_bits(r.read_u32()?);
        color.popularity = r.read_f32()?;
        color.year_from = r.read_u16()?;
        color.year_to = r.read_u16()?;
        if layout >= Layout::V9 {
            color.ldraw_edge_rgb = r.read_u32()?;
            color.luminance = r.read_u8()?;
        }
        Ok(color)
    }

    fn encode<W: Write + Seek>(&self, w: &mut Writer<W>, arena: &Arena) -> Result<()> {
        w.write_u32(self.id.as_u32())?;
        write_str(w, arena, self.name)?;
        w.write_i32(self.ldraw_id)?;
        w.write_u32(self.rgb)?;
        w.write_u32(self.type_flags.bits())?;
        w.write_f32(self.popularity)?;
        w.write_u16(self.year_from)?;
        w.write_u16(self.year_to)?;
        w.write_u32(self.ldraw_edge_rgb)?;
        w.write_u8(self.luminance)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::{decode_table, encode_one, finish, legacy_table};
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn latest_layout() {
        let mut arena = Arena::new();
        let mut color = Color::new(ColorId::new(5), arena.alloc_str("Red"));
        color.ldraw_id = 4;
        color.rgb = 0xc9_1a_09;
        color.type_flags = ColorType::SOLID;
        color.popularity = 0.25;
        color.year_from = 1949;
        color.year_to = 2024;
        color.ldraw_edge_rgb = 0x33_33_33;
        color.luminance = 87;

        let bytes = encode_one(&color, &arena);
        let decoded: Vec<Color> = decode_table(bytes, &mut arena).unwrap();
        assert_eq!(decoded.len(), 1);
        let c = &decoded[0];
        assert_eq!(c.name(&arena), "Red");
        assert_eq!(Color { name: color.name, ..*c }, color);
    }

    #[test]
    fn v6_layout_defaults_ldraw_extras() {
        let mut w = legacy_table(COLORS_CHUNK, Version::V6, 1);
        w.write_u32(1).unwrap();
        w.write_str("White").unwrap();
        w.write_i32(15).unwrap();
        w.write_u32(0xff_ff_ff).unwrap();
        w.write_u32(ColorType::SOLID.bits()).unwrap();
        w.write_f32(1.0).unwrap();
        w.write_u16(1950).unwrap();
        w.write_u16(2024).unwrap();
        let bytes = finish(w);

        let mut arena = Arena::new();
        let decoded: Vec<Color> = decode_table(bytes, &mut arena).unwrap();
        let c = &decoded[0];
        assert_eq!(c.id, ColorId::new(1));
        assert_eq!(c.name(&arena), "White");
        assert_eq!(c.ldraw_id, 15);
        assert_eq!(c.year_to, 2024);
        assert_eq!(c.ldraw_edge_rgb, 0);
        assert_eq!(c.luminance, 0);
    }
}
