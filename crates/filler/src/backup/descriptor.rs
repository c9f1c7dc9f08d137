use std::io::{Read, Write};

use xmltree::{Element, XMLNode};

use super::{serialize, BackupError, DESCRIPTOR_NAME};
use crate::archive::{BackupWriter, EntryHeader};

const ROOT: &str = "moodle_backup";
const COURSE_FILES: &str = "course_files";
const ENABLED: &str = "1";

/// Parse `moodle_backup.xml`, mark it as containing files, and write it out.
pub fn rewrite_descriptor<W: Write>(
    body: impl Read,
    writer: &mut BackupWriter<W>,
) -> Result<(), BackupError> {
    let mut root = Element::parse(body).map_err(|source| BackupError::Parse {
        name: DESCRIPTOR_NAME,
        source,
    })?;
    patch_descriptor(&mut root)?;

    let bytes = serialize(&root, DESCRIPTOR_NAME)?;
    writer.write_entry(
        &EntryHeader::regular(DESCRIPTOR_NAME, bytes.len() as u64),
        &bytes[..],
    )?;
    Ok(())
}

/// Set `information/settings/setting[name=course_files]/value` to `1`,
/// creating the setting if the backup was taken without it.
///
/// Applying this more than once leaves the document unchanged.
pub fn patch_descriptor(root: &mut Element) -> Result<(), BackupError> {
    if root.name != ROOT {
        return Err(BackupError::DescriptorInvalid(format!(
            "expected <{ROOT}> root, found <{}>",
            root.name
        )));
    }
    let settings = root
        .get_mut_child("information")
        .and_then(|information| information.get_mut_child("settings"))
        .ok_or_else(|| {
            BackupError::DescriptorInvalid("missing information/settings".to_string())
        })?;

    let existing = settings
        .children
        .iter_mut()
        .filter_map(XMLNode::as_mut_element)
        .find(|setting| setting.name == "setting" && setting_name(setting) == Some(COURSE_FILES));

    match existing {
        Some(setting) => set_text_child(setting, "value", ENABLED),
        None => {
            tracing::debug!("adding {COURSE_FILES} setting");
            let mut setting = Element::new("setting");
            for (name, text) in [("level", "root"), ("name", COURSE_FILES), ("value", ENABLED)] {
                setting.children.push(XMLNode::Element(text_element(name, text)));
            }
            settings.children.push(XMLNode::Element(setting));
        }
    }
    Ok(())
}

fn setting_name(setting: &Element) -> Option<&str> {
    // older exports put the name in an attribute
    if let Some(name) = setting.attributes.get("name") {
        return Some(name.trim());
    }
    let name = setting.get_child("name")?;
    name.children.iter().find_map(|node| match node {
        XMLNode::Text(text) | XMLNode::CData(text) => Some(text.trim()),
        _ => None,
    })
}

fn set_text_child(parent: &mut Element, name: &str, text: &str) {
    match parent.get_mut_child(name) {
        Some(child) => child.children = vec![XMLNode::Text(text.to_string())],
        None => parent.children.push(XMLNode::Element(text_element(name, text))),
    }
}

fn text_element(name: &str, text: &str) -> Element {
    let mut element = Element::new(name);
    element.children.push(XMLNode::Text(text.to_string()));
    element
}
