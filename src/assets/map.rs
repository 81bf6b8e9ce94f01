//! Quake `.MAP` source files.
//!
//! ```text
//! Map      := Entity+
//! Entity   := '{' ( Property | Brush )* '}'
//! Property := "key" "value"
//! Brush    := '{' Face+ '}'
//! Face     := ( x y z ) ( x y z ) ( x y z ) texname xoff yoff rot xscale yscale
//! ```
//!
//! Points are remapped to Y-up on ingest and each face plane is built from
//! `(p0, p2, p1)` so its normal keeps pointing out of the brush.

use std::{
    fs,
    io::{self, Read},
    path::Path,
};

use glam::{Vec2, Vec3};
use log::warn;
use thiserror::Error;

use super::entities::{Properties, Token, Tokenizer};
use crate::world::{
    geometry::{Plane, to_y_up},
    texcoord::TexturePlacement,
};

/// Brushes need at least this many faces to close a volume.
pub const MIN_BRUSH_FACES: usize = 4;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: expected {expected}, found {found}")]
    UnexpectedToken {
        found: String,
        expected: String,
        line: usize,
    },

    #[error("unexpected end of input inside {context}")]
    UnexpectedEndOfInput { context: &'static str },

    #[error("line {line}: `{text}` is not a number")]
    InvalidNumber { text: String, line: usize },

    #[error("line {line}: entity has no key/value pairs")]
    EmptyEntity { line: usize },

    #[error("line {line}: brush has {count} faces, needs at least {MIN_BRUSH_FACES}")]
    TooFewFaces { count: usize, line: usize },

    #[error("map contains no entities")]
    NoEntities,
}

/// One face line of a brush.
#[derive(Clone, Debug, PartialEq)]
pub struct Face {
    /// Reference points after the Y-up remap, in file order.
    pub points: [Vec3; 3],
    pub plane: Plane,
    pub texture: String,
    pub placement: TexturePlacement,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Brush {
    pub faces: Vec<Face>,
}

impl Brush {
    pub fn planes(&self) -> Vec<Plane> {
        self.faces.iter().map(|f| f.plane).collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Entity {
    pub properties: Properties,
    pub brushes: Vec<Brush>,
}

impl Entity {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn classname(&self) -> Option<&str> {
        self.get("classname")
    }
}

/// A parsed `.MAP` file; `entities[0]` is the world.
#[derive(Clone, Debug, PartialEq)]
pub struct Map {
    pub entities: Vec<Entity>,
}

impl Map {
    pub fn parse(src: &str) -> Result<Self, MapError> {
        let mut tok = Tokenizer::new(src);
        let mut entities = Vec::new();
        while tok.peek()?.is_some() {
            entities.push(parse_entity(&mut tok)?);
        }
        if entities.is_empty() {
            return Err(MapError::NoEntities);
        }
        Ok(Self { entities })
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, MapError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::parse(&text)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MapError> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// The world entity; always present in a parsed map.
    pub fn world(&self) -> Option<&Entity> {
        self.entities.first()
    }

    /// Entries of the world's `wad` key, split on `;`, blanks dropped.
    pub fn wad_paths(&self) -> Vec<&str> {
        self.world()
            .and_then(|w| w.get("wad"))
            .map(|w| {
                w.split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn brush_count(&self) -> usize {
        self.entities.iter().map(|e| e.brushes.len()).sum()
    }
}

fn parse_entity(tok: &mut Tokenizer<'_>) -> Result<Entity, MapError> {
    tok.expect(Token::OpenBrace, "entity")?;
    let open_line = tok.line();
    let mut entity = Entity::default();
    loop {
        match tok.require("entity")? {
            Token::CloseBrace => break,
            Token::Quoted(key) => {
                let value = tok.property_value()?;
                entity.properties.insert(key.to_owned(), value.to_owned());
            }
            Token::OpenBrace => entity.brushes.push(parse_brush(tok)?),
            other => return Err(tok.unexpected(other, "a property, a brush or `}`")),
        }
    }
    if entity.properties.is_empty() {
        return Err(MapError::EmptyEntity { line: open_line });
    }
    Ok(entity)
}

/// Opening brace already consumed.  Faces whose three points do not span a
/// plane are dropped and do not count towards [`MIN_BRUSH_FACES`].
fn parse_brush(tok: &mut Tokenizer<'_>) -> Result<Brush, MapError> {
    let open_line = tok.line();
    let mut brush = Brush::default();
    loop {
        match tok.require("brush")? {
            Token::CloseBrace => break,
            Token::OpenParen => {
                let face = parse_face(tok)?;
                if face.plane.is_degenerate() {
                    warn!("line {}: face points are collinear, face dropped", tok.line());
                } else {
                    brush.faces.push(face);
                }
            }
            other => return Err(tok.unexpected(other, "`(` or `}`")),
        }
    }
    if brush.faces.len() < MIN_BRUSH_FACES {
        return Err(MapError::TooFewFaces {
            count: brush.faces.len(),
            line: open_line,
        });
    }
    Ok(brush)
}

/// Body of a point `x y z )`, opening paren already consumed.
fn parse_point_body(tok: &mut Tokenizer<'_>) -> Result<Vec3, MapError> {
    let x = tok.number("face")?;
    let y = tok.number("face")?;
    let z = tok.number("face")?;
    tok.expect(Token::CloseParen, "face")?;
    Ok(Vec3::new(x, y, z))
}

/// First opening paren already consumed.
fn parse_face(tok: &mut Tokenizer<'_>) -> Result<Face, MapError> {
    let p0 = to_y_up(parse_point_body(tok)?);
    tok.expect(Token::OpenParen, "face")?;
    let p1 = to_y_up(parse_point_body(tok)?);
    tok.expect(Token::OpenParen, "face")?;
    let p2 = to_y_up(parse_point_body(tok)?);

    let texture = match tok.require("face")? {
        Token::Word(w) => w.to_owned(),
        other => return Err(tok.unexpected(other, "a texture name")),
    };
    let offset = Vec2::new(tok.number("face")?, tok.number("face")?);
    let rotation = tok.number("face")?;
    let scale = Vec2::new(tok.number("face")?, tok.number("face")?);

    Ok(Face {
        points: [p0, p1, p2],
        plane: Plane::from_points(p0, p2, p1),
        texture,
        placement: TexturePlacement {
            offset,
            rotation,
            scale,
        },
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 128×128×32 box around the origin, faces in TrenchBroom point order.
    pub(crate) const BOX_BRUSH: &str = "{
( -64 -64 -16 ) ( -64 -63 -16 ) ( -64 -64 -15 ) wall 0 0 0 1 1
( 64 64 16 ) ( 64 64 17 ) ( 64 65 16 ) wall 0 0 0 1 1
( -64 -64 -16 ) ( -64 -64 -15 ) ( -63 -64 -16 ) wall 0 0 0 1 1
( 64 64 16 ) ( 65 64 16 ) ( 64 64 17 ) wall 0 0 0 1 1
( -64 -64 -16 ) ( -63 -64 -16 ) ( -64 -63 -16 ) floor 8 16 0 2 0.5
( 64 64 16 ) ( 64 65 16 ) ( 65 64 16 ) floor 0 0 90 1 1
}";

    pub(crate) fn box_map(wad: &str) -> String {
        format!(
            "// test map\n{{\n\"classname\" \"worldspawn\"\n\"wad\" \"{wad}\"\n{BOX_BRUSH}\n}}\n\
             {{\n\"classname\" \"info_player_start\"\n\"origin\" \"0 0 0\"\n}}\n"
        )
    }

    #[test]
    fn parses_entities_and_brushes() {
        let map = Map::parse(&box_map("gfx/base.wad")).unwrap();
        assert_eq!(map.entities.len(), 2);
        assert_eq!(map.world().unwrap().classname(), Some("worldspawn"));
        assert_eq!(map.entities[1].get("origin"), Some("0 0 0"));
        assert_eq!(map.brush_count(), 1);
        assert_eq!(map.wad_paths(), vec!["gfx/base.wad"]);

        let faces = &map.world().unwrap().brushes[0].faces;
        assert_eq!(faces.len(), 6);
        assert_eq!(faces[4].texture, "floor");
        assert_eq!(faces[4].placement.offset, Vec2::new(8.0, 16.0));
        assert_eq!(faces[4].placement.scale, Vec2::new(2.0, 0.5));
        assert_eq!(faces[5].placement.rotation, 90.0);
    }

    #[test]
    fn planes_point_outward_in_y_up() {
        let map = Map::parse(&box_map("x.wad")).unwrap();
        let planes = map.world().unwrap().brushes[0].planes();
        // file +Z becomes +Y; file -X stays -X
        assert_eq!(planes[5], Plane::new(Vec3::Y, -16.0));
        assert_eq!(planes[4], Plane::new(Vec3::NEG_Y, -16.0));
        assert_eq!(planes[0], Plane::new(Vec3::NEG_X, -64.0));
        // file +Y becomes -Z
        assert_eq!(planes[3], Plane::new(Vec3::NEG_Z, -64.0));
        assert!(planes.iter().all(|p| p.signed_distance(Vec3::ZERO) < 0.0));
    }

    #[test]
    fn wad_key_lists_split() {
        let map = Map::parse("{ \"classname\" \"worldspawn\" \"wad\" \"a.wad; ;b.wad\" }").unwrap();
        assert_eq!(map.wad_paths(), vec!["a.wad", "b.wad"]);
    }

    #[test]
    fn empty_input() {
        assert!(matches!(Map::parse("  // nothing\n"), Err(MapError::NoEntities)));
    }

    #[test]
    fn entity_without_properties() {
        let src = format!("{{\n{BOX_BRUSH}\n}}");
        assert!(matches!(Map::parse(&src), Err(MapError::EmptyEntity { line: 1 })));
    }

    #[test]
    fn brush_with_three_faces() {
        let src = "{ \"classname\" \"worldspawn\"\n{\n\
                   ( 0 0 0 ) ( 0 1 0 ) ( 0 0 1 ) t 0 0 0 1 1\n\
                   ( 0 0 0 ) ( 0 0 1 ) ( 1 0 0 ) t 0 0 0 1 1\n\
                   ( 0 0 0 ) ( 1 0 0 ) ( 0 1 0 ) t 0 0 0 1 1\n} }";
        assert!(matches!(
            Map::parse(src),
            Err(MapError::TooFewFaces { count: 3, line: 2 })
        ));
    }

    #[test]
    fn collinear_face_is_dropped() {
        let collinear = "( 0 0 0 ) ( 1 1 1 ) ( 2 2 2 ) wall 0 0 0 1 1";
        let brush = BOX_BRUSH.replacen('{', &format!("{{\n{collinear}"), 1);
        let src = format!("{{ \"classname\" \"worldspawn\"\n{brush}\n}}");
        let map = Map::parse(&src).unwrap();
        let faces = &map.world().unwrap().brushes[0].faces;
        assert_eq!(faces.len(), 6);
        assert!(faces.iter().all(|f| !f.plane.is_degenerate()));
    }

    #[test]
    fn collinear_face_does_not_count() {
        let src = "{ \"classname\" \"worldspawn\"\n{\n\
                   ( 0 0 0 ) ( 0 1 0 ) ( 0 0 1 ) t 0 0 0 1 1\n\
                   ( 0 0 0 ) ( 0 0 1 ) ( 1 0 0 ) t 0 0 0 1 1\n\
                   ( 0 0 0 ) ( 1 0 0 ) ( 0 1 0 ) t 0 0 0 1 1\n\
                   ( 0 0 0 ) ( 4 0 0 ) ( 8 0 0 ) t 0 0 0 1 1\n} }";
        assert!(matches!(
            Map::parse(src),
            Err(MapError::TooFewFaces { count: 3, line: 2 })
        ));
    }

    #[test]
    fn bad_token_reports_line() {
        let src = "{ \"classname\" \"worldspawn\"\n{\n( 0 0 0 ) ( 0 1 0 ] t 0 0 0 1 1\n} }";
        match Map::parse(src) {
            Err(MapError::UnexpectedToken { found, line, .. }) => {
                assert_eq!(found, "`]`");
                assert_eq!(line, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_number() {
        let src = "{ \"classname\" \"worldspawn\"\n{\n( 0 zero 0 ) ( 0 1 0 ) ( 0 0 1 ) t 0 0 0 1 1\n} }";
        assert!(matches!(
            Map::parse(src),
            Err(MapError::InvalidNumber { line: 3, .. })
        ));
    }

    #[test]
    fn truncated_face() {
        let src = "{ \"classname\" \"worldspawn\"\n{\n( 0 0 0 ) ( 0 1 0 ) ( 0 0 1 ) t 0 0";
        assert!(matches!(
            Map::parse(src),
            Err(MapError::UnexpectedEndOfInput { context: "face" })
        ));
    }
}
