//! PDF form filling.
//!
//! [`FormFiller`] is the seam between the generation loop and whatever writes
//! the documents. [`AcroFormFiller`] implements it over lopdf for AcroForm
//! templates: text fields get a `/V` string, checkboxes and radio buttons get
//! a `/V` name plus a matching `/AS` on every widget.

use lopdf::{Document, Object, ObjectId, StringFormat};
use std::path::Path;

use crate::error::{FillError, FillResult};
use crate::models::FieldValues;

/// Deepest field hierarchy we follow.
const MAX_FIELD_DEPTH: usize = 32;

/// Writes filled copies of a form template and reads field values back.
pub trait FormFiller {
    /// Write a copy of `template` to `destination` with `values` set.
    /// Keys that are not fields of the template are ignored; an existing
    /// destination is overwritten.
    fn fill(&self, template: &Path, destination: &Path, values: &FieldValues) -> FillResult<()>;

    /// Fully qualified field name → current value, for every terminal field.
    fn form_fields(&self, path: &Path) -> FillResult<FieldValues>;
}

/// lopdf-backed AcroForm filler.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcroFormFiller;

impl AcroFormFiller {
    pub fn new() -> Self {
        Self
    }
}

impl FormFiller for AcroFormFiller {
    fn fill(&self, template: &Path, destination: &Path, values: &FieldValues) -> FillResult<()> {
        let mut doc = Document::load(template)?;
        let fields = collect_fields(&doc, template)?;

        for field in &fields {
            let Some(value) = values.get(&field.name) else {
                continue;
            };
            match field.kind {
                FieldKind::Button => set_button(&mut doc, field, value)?,
                FieldKind::Text | FieldKind::Other => set_text(&mut doc, field, value)?,
            }
        }

        set_need_appearances(&mut doc)?;
        doc.save(destination).map_err(|source| FillError::Write {
            path: destination.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    fn form_fields(&self, path: &Path) -> FillResult<FieldValues> {
        let doc = Document::load(path)?;
        let mut values = FieldValues::new();

        for field in collect_fields(&doc, path)? {
            let dict = doc.get_dictionary(field.id)?;
            let value = match dict.get(b"V") {
                Ok(v) => object_text(resolve(&doc, v)?),
                Err(_) => String::new(),
            };
            values.insert(field.name, value);
        }

        Ok(values)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    Button,
    Other,
}

impl FieldKind {
    fn from_name(name: &[u8]) -> Self {
        match name {
            b"Tx" => FieldKind::Text,
            b"Btn" => FieldKind::Button,
            _ => FieldKind::Other,
        }
    }
}

/// A terminal field and the widget annotations that display it.
#[derive(Debug)]
struct FormField {
    id: ObjectId,
    name: String,
    kind: FieldKind,
    widgets: Vec<ObjectId>,
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> FillResult<&'a Object> {
    match obj {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

fn root_fields(doc: &Document, path: &Path) -> FillResult<Vec<ObjectId>> {
    let root_id = doc.trailer.get(b"Root")?.as_reference()?;
    let catalog = doc.get_dictionary(root_id)?;

    let acroform = match catalog.get(b"AcroForm") {
        Ok(obj) => resolve(doc, obj)?.as_dict()?,
        Err(_) => return Err(FillError::NoAcroForm(path.to_path_buf())),
    };

    let fields = match acroform.get(b"Fields") {
        Ok(obj) => resolve(doc, obj)?.as_array()?,
        Err(_) => return Ok(Vec::new()),
    };

    Ok(fields.iter().filter_map(|f| f.as_reference().ok()).collect())
}

fn collect_fields(doc: &Document, path: &Path) -> FillResult<Vec<FormField>> {
    let mut out = Vec::new();
    for id in root_fields(doc, path)? {
        visit_field(doc, id, None, None, 0, &mut out)?;
    }
    Ok(out)
}

fn visit_field(
    doc: &Document,
    id: ObjectId,
    parent: Option<&str>,
    inherited: Option<FieldKind>,
    depth: usize,
    out: &mut Vec<FormField>,
) -> FillResult<()> {
    if depth > MAX_FIELD_DEPTH {
        return Ok(());
    }
    let dict = doc.get_dictionary(id)?;

    let partial = dict
        .get(b"T")
        .ok()
        .and_then(|t| t.as_str().ok())
        .map(decode_text);
    let name = match (parent, partial) {
        (Some(p), Some(t)) => format!("{}.{}", p, t),
        (None, Some(t)) => t,
        (Some(p), None) => p.to_string(),
        (None, None) => return Ok(()),
    };

    let kind = dict
        .get(b"FT")
        .ok()
        .and_then(|ft| ft.as_name().ok())
        .map(FieldKind::from_name)
        .or(inherited);

    let kids: Vec<ObjectId> = dict
        .get(b"Kids")
        .ok()
        .and_then(|k| k.as_array().ok())
        .map(|kids| kids.iter().filter_map(|o| o.as_reference().ok()).collect())
        .unwrap_or_default();

    // Kids with a /T are child fields, the others are widgets of this field.
    let (children, widgets): (Vec<ObjectId>, Vec<ObjectId>) = kids.into_iter().partition(|kid| {
        doc.get_dictionary(*kid)
            .map(|d| d.has(b"T"))
            .unwrap_or(false)
    });

    if !children.is_empty() {
        for child in children {
            visit_field(doc, child, Some(&name), kind, depth + 1, out)?;
        }
        return Ok(());
    }

    out.push(FormField {
        id,
        name,
        kind: kind.unwrap_or(FieldKind::Other),
        widgets: if widgets.is_empty() { vec![id] } else { widgets },
    });
    Ok(())
}

/// Names of the normal appearance states of a widget, e.g. `On`, `Off`.
fn appearance_states(doc: &Document, widget: ObjectId) -> Vec<Vec<u8>> {
    let states = || -> FillResult<Vec<Vec<u8>>> {
        let dict = doc.get_dictionary(widget)?;
        let ap = resolve(doc, dict.get(b"AP")?)?.as_dict()?;
        let normal = resolve(doc, ap.get(b"N")?)?.as_dict()?;
        Ok(normal.iter().map(|(k, _)| k.clone()).collect())
    };
    states().unwrap_or_default()
}

fn set_text(doc: &mut Document, field: &FormField, value: &str) -> FillResult<()> {
    doc.get_dictionary_mut(field.id)?.set("V", encode_text(value));
    // stale appearances would show the template's old content
    for widget in &field.widgets {
        doc.get_dictionary_mut(*widget)?.remove(b"AP");
    }
    Ok(())
}

fn set_button(doc: &mut Document, field: &FormField, value: &str) -> FillResult<()> {
    let widget_states: Vec<(ObjectId, Vec<Vec<u8>>)> = field
        .widgets
        .iter()
        .map(|w| (*w, appearance_states(doc, *w)))
        .collect();

    let requested = value.trim();
    let state: Vec<u8> = if requested.is_empty() || requested == "Off" {
        b"Off".to_vec()
    } else if widget_states
        .iter()
        .any(|(_, states)| states.iter().any(|s| s.as_slice() == requested.as_bytes()))
    {
        requested.as_bytes().to_vec()
    } else {
        // "On" for a box whose on-state has another name, e.g. /Yes
        widget_states
            .iter()
            .flat_map(|(_, states)| states.iter())
            .find(|s| s.as_slice() != b"Off")
            .cloned()
            .unwrap_or_else(|| b"On".to_vec())
    };

    doc.get_dictionary_mut(field.id)?
        .set("V", Object::Name(state.clone()));
    for (widget, states) in widget_states {
        let shown = if states.is_empty() || states.contains(&state) {
            state.clone()
        } else {
            b"Off".to_vec()
        };
        doc.get_dictionary_mut(widget)?.set("AS", Object::Name(shown));
    }
    Ok(())
}

fn set_need_appearances(doc: &mut Document) -> FillResult<()> {
    let root_id = doc.trailer.get(b"Root")?.as_reference()?;
    let form_ref = doc
        .get_dictionary(root_id)?
        .get(b"AcroForm")?
        .as_reference()
        .ok();

    match form_ref {
        Some(id) => doc.get_dictionary_mut(id)?.set("NeedAppearances", true),
        None => {
            if let Object::Dictionary(form) = doc.get_dictionary_mut(root_id)?.get_mut(b"AcroForm")? {
                form.set("NeedAppearances", true);
            }
        }
    }
    Ok(())
}

/// PDF text string: UTF-16BE with BOM, else PDFDocEncoding (read as Latin-1).
fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        String::from_utf8_lossy(rest).into_owned()
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

fn encode_text(value: &str) -> Object {
    if value.is_ascii() {
        Object::string_literal(value)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in value.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

fn object_text(obj: &Object) -> String {
    match obj {
        Object::String(bytes, _) => decode_text(bytes),
        Object::Name(name) => String::from_utf8_lossy(name).into_owned(),
        Object::Integer(i) => i.to_string(),
        Object::Real(r) => r.to_string(),
        Object::Boolean(b) => b.to_string(),
        _ => String::new(),
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{write_template, TemplateField};
    use super::*;
    use lopdf::dictionary;
    use tempfile::tempdir;

    #[test]
    fn test_fill_and_read_back() {
        let dir = tempdir().unwrap();
        let template = dir.path().join("template.pdf");
        let output = dir.path().join("out.pdf");
        write_template(
            &template,
            &[
                TemplateField::Text("Member Code"),
                TemplateField::Text("undefined_4"),
                TemplateField::Checkbox("Seller"),
                TemplateField::Checkbox("Buyer"),
            ],
        );

        let filler = AcroFormFiller::new();
        let blank = filler.form_fields(&template).unwrap();
        assert_eq!(blank["Member Code"], "");
        assert_eq!(blank["Seller"], "Off");

        let mut values = FieldValues::new();
        values.insert("Member Code".into(), "S111".into());
        values.insert("undefined_4".into(), "180.1".into());
        values.insert("Seller".into(), "On".into());
        values.insert("Buyer".into(), "Off".into());
        values.insert("Not A Field".into(), "ignored".into());
        filler.fill(&template, &output, &values).unwrap();

        let filled = filler.form_fields(&output).unwrap();
        assert_eq!(filled.len(), 4);
        assert_eq!(filled["Member Code"], "S111");
        assert_eq!(filled["undefined_4"], "180.1");
        assert_eq!(filled["Seller"], "On");
        assert_eq!(filled["Buyer"], "Off");

        // template untouched
        assert_eq!(filler.form_fields(&template).unwrap()["Member Code"], "");
    }

    #[test]
    fn test_non_ascii_round_trip() {
        let dir = tempdir().unwrap();
        let template = dir.path().join("template.pdf");
        let output = dir.path().join("out.pdf");
        write_template(&template, &[TemplateField::Text("undefined")]);

        let mut values = FieldValues::new();
        values.insert("undefined".into(), "Café Société".into());
        AcroFormFiller.fill(&template, &output, &values).unwrap();

        assert_eq!(AcroFormFiller.form_fields(&output).unwrap()["undefined"], "Café Société");
    }

    #[test]
    fn test_existing_destination_overwritten() {
        let dir = tempdir().unwrap();
        let template = dir.path().join("template.pdf");
        let output = dir.path().join("out.pdf");
        write_template(&template, &[TemplateField::Text("Date")]);
        std::fs::write(&output, b"old content").unwrap();

        let mut values = FieldValues::new();
        values.insert("Date".into(), "19/10/2026".into());
        AcroFormFiller.fill(&template, &output, &values).unwrap();

        assert_eq!(AcroFormFiller.form_fields(&output).unwrap()["Date"], "19/10/2026");
    }

    #[test]
    fn test_missing_acroform() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.pdf");

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! { "Type" => "Pages", "Kids" => Vec::<Object>::new(), "Count" => 0 }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        doc.save(&path).unwrap();

        assert!(matches!(
            AcroFormFiller.form_fields(&path),
            Err(FillError::NoAcroForm(_))
        ));
    }

    #[test]
    fn test_missing_template_is_error() {
        let dir = tempdir().unwrap();
        let result = AcroFormFiller.fill(
            &dir.path().join("nope.pdf"),
            &dir.path().join("out.pdf"),
            &FieldValues::new(),
        );
        assert!(result.is_err());
        assert!(!dir.path().join("out.pdf").exists());
    }

    #[test]
    fn test_text_codec() {
        assert_eq!(decode_text(b"plain"), "plain");
        assert_eq!(decode_text(&[0xFE, 0xFF, 0x00, 0x41, 0x00, 0xE9]), "Aé");
        assert_eq!(object_text(&encode_text("Aé")), "Aé");
        assert_eq!(object_text(&Object::Name(b"On".to_vec())), "On");
    }
}
