use image::{ImageBuffer, ImageOutputFormat, Luma, Rgb};
use lopdf::{Dictionary, Object, Stream};
use std::io::Cursor;
use thiserror::Error;

const PDF_CONTENT_TYPE: &str = "application/pdf";
const IMAGE_CONTENT_TYPE_PREFIX: &str = "image/";
const PDF_MAGIC: &[u8] = b"%PDF";

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Unsupported file type: {0}. Only PDF and image files are supported.")]
    Unsupported(String),
    #[error("No text or page image could be extracted from the PDF")]
    EmptyPdf,
    #[error("Failed to read PDF: {0}")]
    Pdf(String),
    #[error("Invalid or unsupported image format")]
    InvalidImage,
}

/// A file as received from a multipart upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: Option<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Image,
}

/// What the extraction model gets to see.
#[derive(Debug, Clone, PartialEq)]
pub enum PayslipInput {
    Text(String),
    Image(Vec<u8>),
}

pub fn classify(content_type: Option<&str>, bytes: &[u8]) -> Result<FileKind, DocumentError> {
    match content_type.map(str::trim).filter(|ct| !ct.is_empty()) {
        Some(ct) => {
            let essence = ct.split(';').next().unwrap_or(ct).trim().to_lowercase();
            if essence == PDF_CONTENT_TYPE {
                Ok(FileKind::Pdf)
            } else if essence.starts_with(IMAGE_CONTENT_TYPE_PREFIX) {
                Ok(FileKind::Image)
            } else {
                Err(DocumentError::Unsupported(ct.to_string()))
            }
        }
        None if bytes.starts_with(PDF_MAGIC) => Ok(FileKind::Pdf),
        None if image::guess_format(bytes).is_ok() => Ok(FileKind::Image),
        None => Err(DocumentError::Unsupported("unknown".to_string())),
    }
}

/// Converts an upload into model input.
///
/// A PDF is read as text. When no text can be read, as with a scanned
/// payslip, the largest image on its first page is sent instead.
///
/// Blocking: PDF parsing and image decoding are CPU bound, so async callers
/// should run this on the blocking pool.
pub fn prepare(upload: &UploadedFile) -> Result<PayslipInput, DocumentError> {
    match classify(upload.content_type.as_deref(), &upload.bytes)? {
        FileKind::Pdf => match pdf_text(&upload.bytes) {
            Ok(text) => Ok(PayslipInput::Text(text)),
            Err(text_error) => match first_page_image(&upload.bytes) {
                Ok(png) => {
                    log::debug!(
                        "No usable text in PDF '{}' ({}), using its first page image",
                        upload.file_name,
                        text_error
                    );
                    Ok(PayslipInput::Image(png))
                }
                Err(_) => Err(text_error),
            },
        },
        FileKind::Image => to_png(&upload.bytes).map(PayslipInput::Image),
    }
}

fn pdf_text(bytes: &[u8]) -> Result<String, DocumentError> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| DocumentError::Pdf(e.to_string()))?;
    let text = text.trim();
    if text.is_empty() {
        return Err(DocumentError::EmptyPdf);
    }
    Ok(text.to_string())
}

/// The largest image XObject on the first page, as PNG.
pub fn first_page_image(bytes: &[u8]) -> Result<Vec<u8>, DocumentError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| DocumentError::Pdf(e.to_string()))?;
    let page_id = doc
        .get_pages()
        .values()
        .next()
        .copied()
        .ok_or(DocumentError::EmptyPdf)?;

    let xobjects = page_resources(&doc, page_id)
        .and_then(|resources| resources.get(b"XObject").ok())
        .and_then(|obj| resolve(&doc, obj))
        .and_then(|obj| obj.as_dict().ok())
        .ok_or(DocumentError::EmptyPdf)?;

    let image = xobjects
        .iter()
        .filter_map(|(_, obj)| resolve(&doc, obj)?.as_stream().ok())
        .filter(|stream| name_of(&stream.dict, b"Subtype") == Some(b"Image".as_slice()))
        .max_by_key(|stream| {
            u64::from(dimension(stream, b"Width")) * u64::from(dimension(stream, b"Height"))
        })
        .ok_or(DocumentError::EmptyPdf)?;

    decode_image_stream(image)
}

fn resolve<'a>(doc: &'a lopdf::Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Page resources, following `Parent` links for inherited ones.
fn page_resources(doc: &lopdf::Document, page_id: lopdf::ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    loop {
        if let Some(resources) = node
            .get(b"Resources")
            .ok()
            .and_then(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_dict().ok())
        {
            return Some(resources);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
}

fn name_of<'a>(dict: &'a Dictionary, key: &[u8]) -> Option<&'a [u8]> {
    dict.get(key).ok()?.as_name().ok()
}

fn dimension(stream: &Stream, key: &[u8]) -> u32 {
    stream
        .dict
        .get(key)
        .ok()
        .and_then(|obj| obj.as_i64().ok())
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}

fn decode_image_stream(stream: &Stream) -> Result<Vec<u8>, DocumentError> {
    let filter = match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => Some(name.as_slice()),
        Ok(Object::Array(filters)) => filters.last().and_then(|f| f.as_name().ok()),
        _ => None,
    };

    // JPEG data is stored as is
    if filter == Some(b"DCTDecode".as_slice()) {
        return to_png(&stream.content);
    }

    let width = dimension(stream, b"Width");
    let height = dimension(stream, b"Height");
    let bits = stream
        .dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|obj| obj.as_i64().ok());
    if bits != Some(8) {
        return Err(DocumentError::EmptyPdf);
    }

    let samples = match filter {
        None => stream.content.clone(),
        Some(_) => stream
            .decompressed_content()
            .map_err(|e| DocumentError::Pdf(e.to_string()))?,
    };

    let image = match name_of(&stream.dict, b"ColorSpace") {
        Some(b"DeviceRGB") => ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, samples)
            .map(image::DynamicImage::ImageRgb8),
        Some(b"DeviceGray") => ImageBuffer::<Luma<u8>, _>::from_raw(width, height, samples)
            .map(image::DynamicImage::ImageLuma8),
        _ => None,
    }
    .ok_or(DocumentError::EmptyPdf)?;

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .map_err(|_| DocumentError::InvalidImage)?;
    Ok(png)
}

fn to_png(bytes: &[u8]) -> Result<Vec<u8>, DocumentError> {
    let image = image::load_from_memory(bytes).map_err(|_| DocumentError::InvalidImage)?;
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
        .map_err(|_| DocumentError::InvalidImage)?;
    Ok(png)
}
