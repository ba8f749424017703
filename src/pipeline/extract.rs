//! PDF content extraction: per-page text and embedded images via lopdf.
//!
//! ## Why spawn_blocking?
//!
//! Parsing a PDF is CPU-bound and can take hundreds of milliseconds on large
//! documents. `tokio::task::spawn_blocking` moves the work onto the blocking
//! thread pool so the event channel and cancellation handling stay
//! responsive while a file is being parsed.
//!
//! ## Image handling
//!
//! Images live in each page's `/Resources → /XObject` dictionary as streams
//! with `/Subtype /Image`. Two encodings cover the overwhelming majority of
//! real documents and are passed to the description service:
//!
//! * `DCTDecode` — the stream content *is* a JPEG file; forwarded verbatim.
//! * `FlateDecode` (or no filter) with 8-bit `DeviceRGB`/`DeviceGray`
//!   samples — rebuilt into a PNG via the `image` crate.
//!
//! Exotic encodings (JPXDecode, CCITT fax, indexed palettes) are skipped
//! with a debug log; losing a description beats failing the file.

use crate::error::FileError;
use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Document, Object, Stream};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

/// One embedded image, ready for the description service.
#[derive(Debug, Clone)]
pub struct ImageBlob {
    /// Encoded image bytes (JPEG passthrough or re-encoded PNG).
    pub data: Vec<u8>,
    /// MIME type matching `data`.
    pub mime: &'static str,
}

/// Extracted content of a single page.
#[derive(Debug, Clone)]
pub struct PageContent {
    /// 1-indexed page number.
    pub number: u32,
    /// Plain text in reading order, possibly empty.
    pub text: String,
    /// Embedded images in resource order.
    pub images: Vec<ImageBlob>,
}

/// Extracted content of a whole document, pages in order.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub pages: Vec<PageContent>,
}

impl ExtractedDocument {
    /// Total embedded images across all pages.
    pub fn image_count(&self) -> usize {
        self.pages.iter().map(|p| p.images.len()).sum()
    }
}

/// Parse a PDF and extract per-page text and embedded images.
///
/// Runs the parse on the blocking pool. A failure is a per-file
/// [`FileError::ParseFailed`]; the caller continues with the next file.
pub async fn extract(path: &Path) -> Result<ExtractedDocument, FileError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || extract_blocking(&owned))
        .await
        .unwrap_or_else(|e| {
            Err(FileError::ParseFailed {
                path: path.to_path_buf(),
                detail: format!("extraction task panicked: {e}"),
            })
        })
}

/// Blocking implementation of document extraction.
pub fn extract_blocking(path: &Path) -> Result<ExtractedDocument, FileError> {
    let doc = Document::load(path).map_err(|e| FileError::ParseFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    // BTreeMap iteration keeps pages in document order.
    let page_ids = doc.get_pages();
    let mut pages = Vec::with_capacity(page_ids.len());

    for (&number, &page_id) in &page_ids {
        // A page that fails text extraction still contributes an (empty)
        // block so the output keeps one block per page.
        let text = doc.extract_text(&[number]).unwrap_or_default();
        let images = extract_page_images(&doc, page_id, number);

        pages.push(PageContent {
            number,
            text,
            images,
        });
    }

    debug!(
        "extracted {} page(s), {} image(s) from {}",
        pages.len(),
        pages.iter().map(|p| p.images.len()).sum::<usize>(),
        path.display()
    );

    Ok(ExtractedDocument { pages })
}

/// Follow a reference to its target object, or return the object itself.
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn as_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, obj).as_dict().ok()
}

/// Collect the image XObjects referenced by a page's resources.
fn extract_page_images(doc: &Document, page_id: (u32, u16), page_number: u32) -> Vec<ImageBlob> {
    let Ok(page_dict) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    let Some(resources) = page_dict.get(b"Resources").ok().and_then(|o| as_dict(doc, o)) else {
        return Vec::new();
    };
    let Some(xobjects) = resources.get(b"XObject").ok().and_then(|o| as_dict(doc, o)) else {
        return Vec::new();
    };

    // Sort by resource name so image order is deterministic across runs.
    let mut entries: Vec<(&[u8], &Object)> =
        xobjects.iter().map(|(name, obj)| (name.as_slice(), obj)).collect();
    entries.sort_by_key(|(name, _)| name.to_vec());

    let mut images = Vec::new();
    for (name, obj) in entries {
        let Ok(stream) = resolve(doc, obj).as_stream() else {
            continue;
        };
        let is_image = matches!(
            stream.dict.get(b"Subtype").map(|o| resolve(doc, o)),
            Ok(Object::Name(subtype)) if subtype.as_slice() == b"Image"
        );
        if !is_image {
            continue;
        }

        match decode_image_stream(doc, stream) {
            Some(blob) => images.push(blob),
            None => debug!(
                "skipping image '{}' on page {page_number}: unsupported encoding",
                String::from_utf8_lossy(name)
            ),
        }
    }

    images
}

/// Names of the filters applied to a stream, outermost first.
fn stream_filters(doc: &Document, stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(obj) => match resolve(doc, obj) {
            Object::Name(name) => vec![name.clone()],
            Object::Array(items) => items
                .iter()
                .filter_map(|o| match resolve(doc, o) {
                    Object::Name(name) => Some(name.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        },
        Err(_) => Vec::new(),
    }
}

/// Turn one image stream into transferable bytes, or None if unsupported.
fn decode_image_stream(doc: &Document, stream: &Stream) -> Option<ImageBlob> {
    let filters = stream_filters(doc, stream);

    // DCTDecode streams already are complete JPEG files.
    if filters.iter().any(|f| f == b"DCTDecode") {
        return Some(ImageBlob {
            data: stream.content.clone(),
            mime: "image/jpeg",
        });
    }

    // JPXDecode (JPEG 2000) and CCITT are not worth a decoder dependency.
    if filters.iter().any(|f| f != b"FlateDecode") {
        return None;
    }

    // FlateDecode or unfiltered: raw samples we can rebuild into a PNG.
    let width = dict_i64(doc, &stream.dict, b"Width")?;
    let height = dict_i64(doc, &stream.dict, b"Height")?;
    let bits = dict_i64(doc, &stream.dict, b"BitsPerComponent").unwrap_or(8);
    if bits != 8 || width <= 0 || height <= 0 {
        return None;
    }

    let color_space = match stream.dict.get(b"ColorSpace").map(|o| resolve(doc, o)) {
        Ok(Object::Name(name)) => name.clone(),
        _ => return None,
    };

    // Unfiltered streams hold the raw samples directly.
    let data = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream.decompressed_content().ok()?
    };
    let (w, h) = (width as u32, height as u32);

    let dynamic = match color_space.as_slice() {
        b"DeviceRGB" => {
            if data.len() != (w * h * 3) as usize {
                warn!("RGB image sample count mismatch, skipping");
                return None;
            }
            DynamicImage::ImageRgb8(RgbImage::from_raw(w, h, data)?)
        }
        b"DeviceGray" => {
            if data.len() != (w * h) as usize {
                warn!("grayscale image sample count mismatch, skipping");
                return None;
            }
            DynamicImage::ImageLuma8(GrayImage::from_raw(w, h, data)?)
        }
        _ => return None,
    };

    let mut buf = Vec::new();
    dynamic
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .ok()?;

    Some(ImageBlob {
        data: buf,
        mime: "image/png",
    })
}

fn dict_i64(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<i64> {
    dict.get(key).ok().map(|o| resolve(doc, o)).and_then(|o| o.as_i64().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    /// Build a minimal PDF; each entry is (page text, optional image stream).
    fn build_pdf(pages: &[(&str, Option<Stream>)]) -> Vec<u8> {
        let mut doc = Document::with_version("1.4");

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut page_ids = Vec::new();
        for (text, image) in pages {
            let content = format!(
                "BT /F1 12 Tf 100 700 Td ({}) Tj ET",
                text.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)")
            );
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

            let mut resources = dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            };
            if let Some(stream) = image {
                let image_id = doc.add_object(stream.clone());
                resources.set("XObject", dictionary! { "Im0" => image_id });
            }
            let resources_id = doc.add_object(resources);

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            });
            page_ids.push(page_id);
        }

        let kids: Vec<Object> = page_ids.iter().map(|&id| id.into()).collect();
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(pages.len() as i64),
        });
        for page_id in &page_ids {
            if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(*page_id) {
                dict.set("Parent", pages_id);
            }
        }

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn jpeg_image_stream() -> Stream {
        // Content only needs to look like JPEG bytes; DCT streams pass
        // through without decoding.
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 4,
                "Height" => 4,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            vec![0xFF, 0xD8, 0xFF, 0xE0, 0x01, 0x02, 0x03, 0xFF, 0xD9],
        )
    }

    fn raw_gray_image_stream() -> Stream {
        // 2x2 unfiltered 8-bit grayscale samples.
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 2,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0, 85, 170, 255],
        )
    }

    fn write_pdf(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn page_block_count_matches_page_count() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_pdf(&[("Page One", None), ("Page Two", None), ("Page Three", None)]);
        let path = write_pdf(&dir, "three.pdf", &bytes);

        let doc = extract_blocking(&path).unwrap();
        assert_eq!(doc.pages.len(), 3);
        assert_eq!(doc.pages[0].number, 1);
        assert_eq!(doc.pages[2].number, 3);
        assert!(doc.pages[0].text.contains("Page One"));
    }

    #[test]
    fn jpeg_image_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_pdf(&[("With image", Some(jpeg_image_stream()))]);
        let path = write_pdf(&dir, "img.pdf", &bytes);

        let doc = extract_blocking(&path).unwrap();
        assert_eq!(doc.image_count(), 1);
        let blob = &doc.pages[0].images[0];
        assert_eq!(blob.mime, "image/jpeg");
        assert_eq!(&blob.data[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn raw_gray_image_is_reencoded_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_pdf(&[("Gray", Some(raw_gray_image_stream()))]);
        let path = write_pdf(&dir, "gray.pdf", &bytes);

        let doc = extract_blocking(&path).unwrap();
        assert_eq!(doc.image_count(), 1);
        let blob = &doc.pages[0].images[0];
        assert_eq!(blob.mime, "image/png");
        // PNG signature
        assert_eq!(&blob.data[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn corrupt_file_is_parse_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(&dir, "corrupt.pdf", b"this is not a pdf");

        let err = extract_blocking(&path).unwrap_err();
        assert!(matches!(err, FileError::ParseFailed { .. }));
    }

    #[test]
    fn pages_without_images_have_empty_image_list() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_pdf(&[("Just text", None)]);
        let path = write_pdf(&dir, "plain.pdf", &bytes);

        let doc = extract_blocking(&path).unwrap();
        assert_eq!(doc.image_count(), 0);
        assert!(doc.pages[0].images.is_empty());
    }
}
