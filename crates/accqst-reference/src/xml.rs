//! Attribute access shared by the XML readers of this crate.

use std::collections::BTreeMap;

use quick_xml::encoding::Decoder;
use quick_xml::events::BytesStart;

/// Element name as text.
pub(crate) fn element_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.name().as_ref()).into_owned()
}

/// All attributes of an element, unescaped.
pub(crate) fn attributes(
    element: &BytesStart<'_>,
    decoder: Decoder,
) -> Result<BTreeMap<String, String>, String> {
    let mut out = BTreeMap::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .decode_and_unescape_value(decoder)
            .map_err(|e| e.to_string())?;
        out.insert(key, value.into_owned());
    }
    Ok(out)
}
