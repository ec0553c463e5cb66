//! CellCounter marker files.
//!
//! The ImageJ Cell Counter plugin refuses a marker file unless
//! `Image_Filename` matches the name it expects for the open image, so the
//! stem is written exactly as given and never normalised here.

use anyhow::{Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::models::Blob;

const ROOT: &str = "CellCounter_Marker_File";
const IMAGE_PROPERTIES: &str = "Image_Properties";
const IMAGE_FILENAME: &str = "Image_Filename";
const MARKER_DATA: &str = "Marker_Data";
const CURRENT_TYPE: &str = "Current_Type";
const MARKER_TYPE: &str = "Marker_Type";
const TYPE: &str = "Type";
const MARKER: &str = "Marker";
const MARKER_X: &str = "MarkerX";
const MARKER_Y: &str = "MarkerY";
const MARKER_Z: &str = "MarkerZ";

/// Marker type slots the plugin always expects
pub const MARKER_TYPES: std::ops::RangeInclusive<u32> = 1..=8;

/// Slot that receives every detected blob
pub const BLOB_MARKER_TYPE: u32 = 1;

const INVALID_STEM_CHARS: &[char] = &['/', '\\', '\0', '<', '>', ':', '"', '|', '?', '*'];

/// Anything with a row/column position in image pixels
pub trait Coordinate {
    fn row(&self) -> f64;
    fn col(&self) -> f64;
}

impl Coordinate for (f64, f64) {
    fn row(&self) -> f64 {
        self.0
    }

    fn col(&self) -> f64 {
        self.1
    }
}

impl Coordinate for (f64, f64, f64) {
    fn row(&self) -> f64 {
        self.0
    }

    fn col(&self) -> f64 {
        self.1
    }
}

impl Coordinate for Blob {
    fn row(&self) -> f64 {
        self.row
    }

    fn col(&self) -> f64 {
        self.col
    }
}

impl<T: Coordinate> Coordinate for &T {
    fn row(&self) -> f64 {
        (*self).row()
    }

    fn col(&self) -> f64 {
        (*self).col()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl Marker {
    /// x = column, y = row, both truncated toward zero; z is always 1
    pub fn from_coordinate(coord: &impl Coordinate) -> Self {
        Self {
            x: coord.col() as i64,
            y: coord.row() as i64,
            z: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerType {
    pub type_id: u32,
    pub markers: Vec<Marker>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerFile {
    pub image_filename: String,
    pub current_type: u32,
    pub marker_types: Vec<MarkerType>,
}

impl MarkerFile {
    /// All coordinates go into type 1; types 2-8 are present but empty
    pub fn from_coords<C: Coordinate>(stem: &str, coords: &[C]) -> Result<Self> {
        validate_stem(stem)?;

        let marker_types = MARKER_TYPES
            .map(|type_id| MarkerType {
                type_id,
                markers: if type_id == BLOB_MARKER_TYPE {
                    coords.iter().map(Marker::from_coordinate).collect()
                } else {
                    Vec::new()
                },
            })
            .collect();

        Ok(Self {
            image_filename: stem.to_string(),
            current_type: 0,
            marker_types,
        })
    }

    pub fn markers_of(&self, type_id: u32) -> &[Marker] {
        self.marker_types
            .iter()
            .find(|t| t.type_id == type_id)
            .map(|t| t.markers.as_slice())
            .unwrap_or(&[])
    }

    pub fn marker_count(&self) -> usize {
        self.marker_types.iter().map(|t| t.markers.len()).sum()
    }

    /// Pretty-printed document, 2-space indent, with an XML declaration
    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        start(&mut writer, ROOT)?;

        start(&mut writer, IMAGE_PROPERTIES)?;
        text_element(&mut writer, IMAGE_FILENAME, &self.image_filename)?;
        end(&mut writer, IMAGE_PROPERTIES)?;

        start(&mut writer, MARKER_DATA)?;
        text_element(&mut writer, CURRENT_TYPE, &self.current_type.to_string())?;
        for marker_type in &self.marker_types {
            start(&mut writer, MARKER_TYPE)?;
            text_element(&mut writer, TYPE, &marker_type.type_id.to_string())?;
            for marker in &marker_type.markers {
                start(&mut writer, MARKER)?;
                text_element(&mut writer, MARKER_X, &marker.x.to_string())?;
                text_element(&mut writer, MARKER_Y, &marker.y.to_string())?;
                text_element(&mut writer, MARKER_Z, &marker.z.to_string())?;
                end(&mut writer, MARKER)?;
            }
            end(&mut writer, MARKER_TYPE)?;
        }
        end(&mut writer, MARKER_DATA)?;

        end(&mut writer, ROOT)?;

        let mut xml = String::from_utf8(writer.into_inner())?;
        xml.push('\n');
        Ok(xml)
    }

    /// Write `<dir>/<stem>.xml` and return its path.
    ///
    /// The document is serialised before the file is created, so a failure
    /// never leaves a truncated file behind.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        validate_stem(&self.image_filename)?;
        let xml = self.to_xml_string()?;

        let path = dir.join(format!("{}.xml", self.image_filename));
        let file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create marker file {}", path.display()))?;
        let mut out = BufWriter::new(file);
        out.write_all(xml.as_bytes())?;
        out.flush()?;

        log::info!(
            "Saved {} markers to {}",
            self.marker_count(),
            path.display()
        );
        Ok(path)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read marker file {}", path.display()))?;
        Self::from_xml_str(&content)
            .with_context(|| format!("Malformed marker file {}", path.display()))
    }

    /// Parse a marker document. Markers may sit directly under `Marker_Type`
    /// or nested inside its `Type` element, as some older files have them.
    pub fn from_xml_str(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut file = MarkerFile {
            image_filename: String::new(),
            current_type: 0,
            marker_types: Vec::new(),
        };
        let mut stack: Vec<String> = Vec::new();
        let mut marker: Option<(Option<i64>, Option<i64>, Option<i64>)> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let name = element_name(&e)?;
                    if stack.is_empty() && name != ROOT {
                        anyhow::bail!("Expected <{}> root, found <{}>", ROOT, name);
                    }
                    match name.as_str() {
                        MARKER_TYPE => file.marker_types.push(MarkerType {
                            type_id: 0,
                            markers: Vec::new(),
                        }),
                        MARKER => marker = Some((None, None, None)),
                        _ => {}
                    }
                    stack.push(name);
                }
                Event::Empty(e) => {
                    if element_name(&e)? == MARKER_TYPE {
                        file.marker_types.push(MarkerType {
                            type_id: 0,
                            markers: Vec::new(),
                        });
                    }
                }
                Event::Text(t) => {
                    let text = t.unescape()?;
                    let text = text.trim();
                    match stack.last().map(String::as_str) {
                        Some(IMAGE_FILENAME) => file.image_filename = text.to_string(),
                        Some(CURRENT_TYPE) => file.current_type = parse_field(CURRENT_TYPE, text)?,
                        Some(TYPE) => {
                            let type_id = parse_field(TYPE, text)?;
                            let slot = file
                                .marker_types
                                .last_mut()
                                .ok_or_else(|| anyhow::anyhow!("<Type> outside <Marker_Type>"))?;
                            slot.type_id = type_id;
                        }
                        Some(axis @ (MARKER_X | MARKER_Y | MARKER_Z)) => {
                            let value = parse_field(axis, text)?;
                            let m = marker
                                .as_mut()
                                .ok_or_else(|| anyhow::anyhow!("<{}> outside <Marker>", axis))?;
                            match axis {
                                MARKER_X => m.0 = Some(value),
                                MARKER_Y => m.1 = Some(value),
                                _ => m.2 = Some(value),
                            }
                        }
                        _ => {}
                    }
                }
                Event::End(e) => {
                    let qname = e.name();
                    let name = std::str::from_utf8(qname.as_ref())?;
                    if name == MARKER {
                        let (x, y, z) = marker
                            .take()
                            .ok_or_else(|| anyhow::anyhow!("Unbalanced </Marker>"))?;
                        let parsed = Marker {
                            x: x.ok_or_else(|| anyhow::anyhow!("Marker without <MarkerX>"))?,
                            y: y.ok_or_else(|| anyhow::anyhow!("Marker without <MarkerY>"))?,
                            z: z.unwrap_or(1),
                        };
                        file.marker_types
                            .last_mut()
                            .ok_or_else(|| anyhow::anyhow!("<Marker> outside <Marker_Type>"))?
                            .markers
                            .push(parsed);
                    }
                    stack.pop();
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if file.marker_types.is_empty() && file.image_filename.is_empty() {
            anyhow::bail!("No <{}> document found", ROOT);
        }

        Ok(file)
    }
}

/// Build the marker document for `coords` and write `<stem>.xml` to the
/// current directory
pub fn save_for_imagej<C: Coordinate>(coords: &[C], stem: &str) -> Result<PathBuf> {
    MarkerFile::from_coords(stem, coords)?.write_to_dir(Path::new(""))
}

/// Reject stems that cannot name a file in a single directory
pub fn validate_stem(stem: &str) -> Result<()> {
    if stem.is_empty() || stem == "." || stem == ".." {
        anyhow::bail!("Invalid file stem '{}'", stem);
    }
    if let Some(c) = stem.chars().find(|c| INVALID_STEM_CHARS.contains(c)) {
        anyhow::bail!("File stem '{}' contains illegal character {:?}", stem, c);
    }
    Ok(())
}

fn start<W: Write>(writer: &mut Writer<W>, tag: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    Ok(())
}

fn end<W: Write>(writer: &mut Writer<W>, tag: &str) -> Result<()> {
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> Result<()> {
    start(writer, tag)?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    end(writer, tag)
}

fn element_name(e: &BytesStart) -> Result<String> {
    Ok(std::str::from_utf8(e.name().as_ref())?.to_string())
}

fn parse_field<T: std::str::FromStr>(tag: &str, text: &str) -> Result<T> {
    text.parse()
        .map_err(|_| anyhow::anyhow!("Invalid <{}> value '{}'", tag, text))
}
