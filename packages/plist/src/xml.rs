//! Apple XML property-list reading and writing.
//!
//! Only `dict`, `array`, `string`, `integer`, `true` and `false` are
//! understood. Any other element in value position fails the whole load.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tempfile::NamedTempFile;

use crate::cell::{ArrayRef, CellValue, DictRef};
use crate::document::{Plist, PlistArray, PlistDict};
use crate::error::Error;

const DOCTYPE: &str = r#"plist PUBLIC "-//Apple Computer//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd""#;

/// Modification time of `path` in whole seconds since the epoch.
pub fn file_mod_time(path: &Path) -> io::Result<i64> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(match modified.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs() as i64,
        Err(before) => -(before.duration().as_secs() as i64),
    })
}

/// Reads and parses a plist file, recording its filename and timestamp.
pub fn load_plist(path: &Path) -> Result<Plist, Error> {
    log::debug!("Reading {}...", path.display());
    let bytes = fs::read(path)?;
    let mut plist = parse_plist(&bytes)?;
    if let Some(name) = path.file_name() {
        plist.set_filename(name.to_string_lossy());
    }
    plist.set_mod_time(file_mod_time(path)?);
    Ok(plist)
}

pub fn parse_plist(bytes: &[u8]) -> Result<Plist, Error> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::parse(format!("document is not UTF-8: {}", e)))?;
    let mut parser = Parser {
        reader: Reader::from_str(text),
    };
    parser.document()
}

/// Structural events, with whitespace and prolog noise filtered out.
enum Node<'a> {
    Open(BytesStart<'a>),
    Empty(BytesStart<'a>),
    Close(BytesEnd<'a>),
    Eof,
}

impl Node<'_> {
    fn is_open(&self, tag: &[u8]) -> bool {
        matches!(self, Node::Open(e) if e.name().as_ref() == tag)
    }

    fn is_empty(&self, tag: &[u8]) -> bool {
        matches!(self, Node::Empty(e) if e.name().as_ref() == tag)
    }

    fn is_close(&self, tag: &[u8]) -> bool {
        matches!(self, Node::Close(e) if e.name().as_ref() == tag)
    }

    fn describe(&self) -> String {
        match self {
            Node::Open(e) => format!("<{}>", String::from_utf8_lossy(e.name().as_ref())),
            Node::Empty(e) => format!("<{}/>", String::from_utf8_lossy(e.name().as_ref())),
            Node::Close(e) => format!("</{}>", String::from_utf8_lossy(e.name().as_ref())),
            Node::Eof => "end of document".to_owned(),
        }
    }
}

struct Parser<'a> {
    reader: Reader<&'a [u8]>,
}

impl<'a> Parser<'a> {
    fn next(&mut self) -> Result<Node<'a>, Error> {
        loop {
            match self.reader.read_event()? {
                Event::Start(e) => return Ok(Node::Open(e)),
                Event::Empty(e) => return Ok(Node::Empty(e)),
                Event::End(e) => return Ok(Node::Close(e)),
                Event::Eof => return Ok(Node::Eof),
                Event::Text(text) => {
                    if !text.iter().all(u8::is_ascii_whitespace) {
                        return Err(Error::parse(format!(
                            "unexpected text at byte {}",
                            self.reader.buffer_position()
                        )));
                    }
                }
                Event::CData(_) => {
                    return Err(Error::parse(format!(
                        "unexpected CDATA at byte {}",
                        self.reader.buffer_position()
                    )))
                }
                _ => {}
            }
        }
    }

    fn document(&mut self) -> Result<Plist, Error> {
        let mut plist = Plist::new();

        let node = self.next()?;
        if !node.is_open(b"plist") {
            return Err(Error::parse(format!(
                "expected <plist>, found {}",
                node.describe()
            )));
        }

        let node = self.next()?;
        if node.is_open(b"dict") {
            self.dict(&mut plist, DictRef::ROOT)?;
        } else if !node.is_empty(b"dict") {
            return Err(Error::parse(format!(
                "the root value must be a dict, found {}",
                node.describe()
            )));
        }

        let node = self.next()?;
        if !node.is_close(b"plist") {
            return Err(Error::parse(format!(
                "expected </plist>, found {}",
                node.describe()
            )));
        }
        match self.next()? {
            Node::Eof => Ok(plist),
            node => Err(Error::parse(format!(
                "content after </plist>: {}",
                node.describe()
            ))),
        }
    }

    fn dict(&mut self, plist: &mut Plist, dict: DictRef) -> Result<(), Error> {
        loop {
            let node = self.next()?;
            let key = if node.is_close(b"dict") {
                return Ok(());
            } else if node.is_open(b"key") {
                self.text(b"key")?
            } else if node.is_empty(b"key") {
                String::new()
            } else {
                return Err(Error::parse(format!(
                    "expected <key>, found {}",
                    node.describe()
                )));
            };

            let value = match self.next()? {
                Node::Open(tag) => self.value(plist, tag, false)?,
                Node::Empty(tag) => self.value(plist, tag, true)?,
                node => {
                    return Err(Error::parse(format!(
                        "key '{}' has no value, found {}",
                        key,
                        node.describe()
                    )))
                }
            };
            plist.dict_mut(dict).replace(&key, value);
        }
    }

    fn array(&mut self, plist: &mut Plist, array: ArrayRef) -> Result<(), Error> {
        loop {
            let value = match self.next()? {
                node if node.is_close(b"array") => return Ok(()),
                Node::Open(tag) => self.value(plist, tag, false)?,
                Node::Empty(tag) => self.value(plist, tag, true)?,
                node => {
                    return Err(Error::parse(format!(
                        "unexpected {} in array",
                        node.describe()
                    )))
                }
            };
            plist.arrays[array.index()].items.push(value);
        }
    }

    fn value(&mut self, plist: &mut Plist, tag: BytesStart<'a>, empty: bool) -> Result<CellValue, Error> {
        match tag.name().as_ref() {
            b"string" => {
                let text = if empty {
                    String::new()
                } else {
                    self.text(b"string")?
                };
                Ok(CellValue::String(plist.add_string(&text)))
            }
            b"integer" => {
                if empty {
                    return Err(Error::parse("empty <integer>"));
                }
                let text = self.text(b"integer")?;
                text.trim()
                    .parse::<i64>()
                    .map(CellValue::Integer)
                    .map_err(|_| Error::parse(format!("invalid integer '{}'", text)))
            }
            name @ (b"true" | b"false") => {
                let flag = name == b"true";
                if !empty {
                    self.close(name)?;
                }
                Ok(CellValue::Bool(flag))
            }
            b"dict" => {
                let dict = plist.add_dict();
                if !empty {
                    self.dict(plist, dict)?;
                }
                Ok(CellValue::Dict(dict))
            }
            b"array" => {
                let array = plist.add_array();
                if !empty {
                    self.array(plist, array)?;
                }
                Ok(CellValue::Array(array))
            }
            other => Err(Error::UnknownTag {
                tag: String::from_utf8_lossy(other).into_owned(),
            }),
        }
    }

    /// Character content up to the closing tag, kept exactly as written.
    fn text(&mut self, tag: &[u8]) -> Result<String, Error> {
        let mut text = String::new();
        loop {
            match self.reader.read_event()? {
                Event::Text(chunk) => text.push_str(&chunk.unescape()?),
                Event::CData(chunk) => {
                    let bytes = chunk.into_inner();
                    let chunk = std::str::from_utf8(&bytes)
                        .map_err(|e| Error::parse(format!("CDATA is not UTF-8: {}", e)))?;
                    text.push_str(chunk);
                }
                Event::Comment(_) => {}
                Event::End(e) if e.name().as_ref() == tag => return Ok(text),
                _ => {
                    return Err(Error::parse(format!(
                        "unexpected markup inside <{}>",
                        String::from_utf8_lossy(tag)
                    )))
                }
            }
        }
    }

    fn close(&mut self, tag: &[u8]) -> Result<(), Error> {
        let node = self.next()?;
        if node.is_close(tag) {
            Ok(())
        } else {
            Err(Error::parse(format!(
                "expected </{}>, found {}",
                String::from_utf8_lossy(tag),
                node.describe()
            )))
        }
    }
}

/// Serializes the document. The output only depends on the content.
pub fn to_xml(plist: &Plist) -> Result<Vec<u8>, Error> {
    let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::DocType(BytesText::from_escaped(DOCTYPE)))?;
    writer.write_event(Event::Start(
        BytesStart::new("plist").with_attributes([("version", "1.0")]),
    ))?;
    write_dict(&mut writer, plist.root())?;
    writer.write_event(Event::End(BytesEnd::new("plist")))?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

fn write_text(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<(), Error> {
    // An empty Start/End pair would get an indented line break between the
    // tags, which reads back as content.
    if text.is_empty() {
        writer.write_event(Event::Empty(BytesStart::new(tag)))?;
    } else {
        writer.write_event(Event::Start(BytesStart::new(tag)))?;
        writer.write_event(Event::Text(BytesText::new(text)))?;
        writer.write_event(Event::End(BytesEnd::new(tag)))?;
    }
    Ok(())
}

fn write_value(writer: &mut Writer<Vec<u8>>, plist: &Plist, value: CellValue) -> Result<(), Error> {
    match value {
        CellValue::String(r) => write_text(writer, "string", plist.string(r)),
        CellValue::Integer(number) => write_text(writer, "integer", &number.to_string()),
        CellValue::Bool(flag) => {
            let tag = if flag { "true" } else { "false" };
            writer.write_event(Event::Empty(BytesStart::new(tag)))?;
            Ok(())
        }
        CellValue::Dict(dict) => write_dict(writer, plist.dict(dict)),
        CellValue::Array(array) => write_array(writer, plist.array(array)),
    }
}

fn write_dict(writer: &mut Writer<Vec<u8>>, dict: PlistDict<'_>) -> Result<(), Error> {
    if dict.is_empty() {
        writer.write_event(Event::Empty(BytesStart::new("dict")))?;
        return Ok(());
    }
    writer.write_event(Event::Start(BytesStart::new("dict")))?;
    for (key, value) in dict.entries() {
        write_text(writer, "key", key)?;
        write_value(writer, dict.plist(), value)?;
    }
    writer.write_event(Event::End(BytesEnd::new("dict")))?;
    Ok(())
}

fn write_array(writer: &mut Writer<Vec<u8>>, array: PlistArray<'_>) -> Result<(), Error> {
    if array.is_empty() {
        writer.write_event(Event::Empty(BytesStart::new("array")))?;
        return Ok(());
    }
    writer.write_event(Event::Start(BytesStart::new("array")))?;
    for value in array.iter() {
        write_value(writer, array.plist(), value)?;
    }
    writer.write_event(Event::End(BytesEnd::new("array")))?;
    Ok(())
}

/// Writes the document to `dir/filename` and refreshes its timestamp.
///
/// The file is written through a temporary file in the same directory and
/// renamed into place. If the file already holds exactly these bytes it is
/// left alone, so its timestamp does not move.
pub fn save_plist(plist: &mut Plist, dir: &Path) -> Result<PathBuf, Error> {
    if plist.filename().is_empty() {
        return Err(Error::MissingFilename);
    }
    let path = dir.join(plist.filename());
    let bytes = to_xml(plist)?;

    let unchanged = fs::read(&path).map(|existing| existing == bytes).unwrap_or(false);
    if unchanged {
        log::debug!("{} is unchanged, not rewriting", path.display());
    } else {
        fs::create_dir_all(dir)?;
        log::debug!("Writing {}...", path.display());
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(&bytes)?;
        if let Some(permissions) = target_permissions(&path) {
            file.as_file().set_permissions(permissions)?;
        }
        file.persist(&path).map_err(|e| Error::Io(e.error))?;
    }

    plist.set_mod_time(file_mod_time(&path)?);
    Ok(path)
}

/// Permissions a rewritten file should end up with: the current file's,
/// or `0644` for a new one. Temporary files start out owner-only.
fn target_permissions(path: &Path) -> Option<fs::Permissions> {
    match fs::metadata(path) {
        Ok(metadata) => Some(metadata.permissions()),
        Err(_) => new_file_permissions(),
    }
}

#[cfg(unix)]
fn new_file_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<fs::Permissions> {
    None
}


#[cfg(test)]
mod proptests {
    use proptest::prelude::*;
    use serde_json::Value as JsonValue;

    use super::*;

    fn text() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 \t\n<>&'\"$é中]{0,16}"
    }

    fn value() -> impl Strategy<Value = JsonValue> {
        let leaf = prop_oneof![
            any::<i64>().prop_map(JsonValue::from),
            any::<bool>().prop_map(JsonValue::from),
            text().prop_map(JsonValue::from),
        ];
        leaf.prop_recursive(4, 48, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(JsonValue::Array),
                prop::collection::vec(("[a-zA-Z_]{1,8}", inner), 0..6)
                    .prop_map(|members| JsonValue::Object(members.into_iter().collect())),
            ]
        })
    }

    fn document() -> impl Strategy<Value = JsonValue> {
        prop::collection::vec(("[a-zA-Z_ ]{0,8}", value()), 0..8)
            .prop_map(|members| JsonValue::Object(members.into_iter().collect()))
    }

    proptest! {
        #[test]
        fn prop_xml_roundtrip(doc in document()) {
            let mut plist = Plist::new();
            plist.root_mut().set_json(&doc, false).unwrap();

            let xml = to_xml(&plist).unwrap();
            let loaded = parse_plist(&xml).unwrap();

            // Serialized JSON keeps member order, so this also checks ordering.
            prop_assert_eq!(
                serde_json::to_string(&loaded.root().to_json(false)).unwrap(),
                serde_json::to_string(&doc).unwrap()
            );
            prop_assert_eq!(to_xml(&loaded).unwrap(), xml);
        }
    }
}
