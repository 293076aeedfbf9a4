/// Flatten free text so it sits in a single CSV cell.
///
/// Line breaks and tabs become spaces, whitespace runs collapse to one space,
/// and double quotes become single quotes.
pub fn clean_for_csv(text: Option<&str>) -> String {
    let Some(text) = text else {
        return String::new();
    };

    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('"', "'")
}
