pub mod brush;
pub mod geometry;
pub mod mesh;
pub mod texcoord;
pub mod texture;

pub use brush::{BrushPolygons, FacePolygon, PolygonError, polygonise};
pub use geometry::{Aabb, Plane, from_y_up, intersect_three_planes, to_y_up};
pub use mesh::{Mesh, TexturedMesh, Winding};
pub use texcoord::{TexAxes, TexturePlacement};
pub use texture::{Image, NO_TEXTURE, TextureBank, TextureError, TextureId};
