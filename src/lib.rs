//! Geometry core for id Software's Quake level formats.
//!
//! * [`assets`] – `.MAP` text, BSP v23, WAD2, mip textures, palettes and the
//!   load pipelines turning them into textured triangle batches.
//! * [`world`] – format-agnostic geometry: planes, brush polygons, texture
//!   projection, meshes and the texture bank.
//! * [`scene`] – the [`scene::Uploader`] seam and reload handling.
//!
//! All output is right-handed and Y-up: file positions `(x, y, z)` become
//! `(x, z, -y)`.

pub mod assets;
pub mod scene;
pub mod world;
