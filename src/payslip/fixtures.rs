//! Payslips and upload files shared by the tests.

use chrono::NaiveDate;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::document::UploadedFile;
use crate::models::{
    Benefit, EmployerInfo, EmploymentInfo, ExtractedPayslip, Extras, FinancialInfo, PeriodInfo,
    PersonalInfo,
};

fn dec(s: &str) -> Option<Decimal> {
    Some(Decimal::from_str(s).unwrap())
}

/// March 2024 payslip for Jan Peeters.
pub fn sample_payslip() -> ExtractedPayslip {
    ExtractedPayslip {
        personal: Some(PersonalInfo {
            name: Some("Jan Peeters".into()),
            national_id: Some("85.07.30-033.61".into()),
            dependents: Some(2),
            ..Default::default()
        }),
        employer: None,
        employment: Some(EmploymentInfo {
            employee_number: Some("E-1042".into()),
            base_monthly_salary: dec("3250.50"),
            ..Default::default()
        }),
        period: Some(PeriodInfo {
            period_start: NaiveDate::from_ymd_opt(2024, 3, 1),
            currency: Some("EUR".into()),
            ..Default::default()
        }),
        financial: Some(FinancialInfo {
            gross: dec("3600.00"),
            net: dec("2410.12"),
            payment_iban: Some("BE68 5390 0754 7034".into()),
            ..Default::default()
        }),
        extras: Some(Extras {
            meal_voucher_count: Some(21),
            benefits: vec![Benefit {
                code: Some("CAR".into()),
                amount: dec("120"),
                taxable: Some(true),
                ..Default::default()
            }],
            ..Default::default()
        }),
    }
}

/// The following month: a raise, a changed car benefit and a new bonus.
pub fn april_payslip() -> ExtractedPayslip {
    let mut payslip = sample_payslip();
    payslip.employer = Some(EmployerInfo {
        name: Some("Acme NV".into()),
        employer_number: Some("0123.456.789".into()),
        ..Default::default()
    });
    if let Some(period) = payslip.period.as_mut() {
        period.period_start = NaiveDate::from_ymd_opt(2024, 4, 1);
    }
    if let Some(financial) = payslip.financial.as_mut() {
        financial.gross = dec("3700.00");
        financial.net = dec("2460.12");
    }
    if let Some(extras) = payslip.extras.as_mut() {
        extras.benefits = vec![
            Benefit {
                code: Some("CAR".into()),
                amount: dec("150"),
                taxable: Some(true),
                ..Default::default()
            },
            Benefit {
                code: Some("BONUS".into()),
                label: Some("Performance bonus".into()),
                amount: dec("250"),
                direction: Some("EARNING".into()),
                ..Default::default()
            },
        ];
    }
    payslip
}

/// The payslip as a model would reply with it.
pub fn reply_for(payslip: &ExtractedPayslip) -> String {
    format!("```json\n{}\n```", serde_json::to_string(payslip).unwrap())
}

pub fn png_upload(name: &str) -> UploadedFile {
    let img = image::ImageBuffer::from_pixel(4, 4, image::Rgb([255u8, 255, 255]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageOutputFormat::Png,
        )
        .unwrap();
    UploadedFile::new(name, Some("image/png".to_string()), bytes)
}

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = image::ImageBuffer::from_pixel(width, height, image::Rgb([40u8, 90, 160]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageOutputFormat::Jpeg(90),
        )
        .unwrap();
    bytes
}

/// One A4 page. Resources sit on the page tree node and are inherited.
fn build_pdf<F>(operations: Vec<Operation>, resources: F) -> Vec<u8>
where
    F: FnOnce(&mut Document) -> lopdf::Dictionary,
{
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let resources = resources(&mut doc);
    let resources_id = doc.add_object(resources);
    let content = Content { operations }.encode().unwrap();
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// A PDF with a text layer.
pub fn text_pdf(text: &str) -> Vec<u8> {
    build_pdf(
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 760.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
        |doc| {
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Courier",
                "Encoding" => "WinAnsiEncoding",
            });
            dictionary! { "Font" => dictionary! { "F1" => font_id } }
        },
    )
}

fn image_stream(width: i64, height: i64, color_space: &str, filter: Option<&str>, data: Vec<u8>) -> Stream {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width,
        "Height" => height,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
    };
    if let Some(filter) = filter {
        dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
    }
    Stream::new(dict, data)
}

/// Image XObjects in the page resources. The content stream stays empty so
/// the text extractor has nothing to draw.
fn image_pdf(images: Vec<(&'static str, Stream)>) -> Vec<u8> {
    build_pdf(Vec::new(), move |doc| {
        let mut xobjects = lopdf::Dictionary::new();
        for (name, stream) in images {
            let id = doc.add_object(stream);
            xobjects.set(name, Object::Reference(id));
        }
        dictionary! { "XObject" => xobjects }
    })
}

/// A scanned payslip: a 16x12 JPEG scan next to a 2x2 grey logo, no text.
pub fn scanned_pdf() -> Vec<u8> {
    image_pdf(vec![
        ("Im0", image_stream(2, 2, "DeviceGray", None, vec![0, 255, 255, 0])),
        ("Im1", image_stream(16, 12, "DeviceRGB", Some("DCTDecode"), jpeg(16, 12))),
    ])
}

/// A scan stored as raw grey samples.
pub fn gray_scan_pdf() -> Vec<u8> {
    image_pdf(vec![(
        "Im0",
        image_stream(3, 2, "DeviceGray", None, vec![10, 20, 30, 40, 50, 60]),
    )])
}

/// A page with neither text nor images.
pub fn blank_pdf() -> Vec<u8> {
    build_pdf(Vec::new(), |_| lopdf::Dictionary::new())
}

pub fn pdf_upload(name: &str, bytes: Vec<u8>) -> UploadedFile {
    UploadedFile::new(name, Some("application/pdf".to_string()), bytes)
}
