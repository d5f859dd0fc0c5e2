/// Clean HTML content using the ammonia library.
///
/// Whitelist-based: safe inline tags (like <b>, <i>) survive, while dangerous tags
/// (like <script>, <iframe>) are removed along with their content and event-handler
/// attributes are stripped. Chat messages pass through this before storage.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
