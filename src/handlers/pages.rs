//! HTML rendering for the gallery page and the upload error fragment.

use crate::models::photo::Photo;

const UPLOAD_FORM: &str = r#"<h1>Upload and View Images</h1>
<form method="post" enctype="multipart/form-data" action="/upload">
  <div>
    <label for="file">Choose file to upload</label>
    <input type="file" id="file" name="form_file" accept="image/jpeg,image/png"/>
  </div>
  <div>
    <button>Submit</button>
  </div>
</form>
"#;

/// Index page: the upload form, then one entry per photo showing its name
/// and the image at `photo.url`.
pub fn render_index(photos: &[Photo]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html><head><title>Photo gallery</title></head><body>\n",
    );
    html.push_str(UPLOAD_FORM);
    html.push_str("<ul>\n");
    for photo in photos {
        let name = html_escape(&photo.name);
        let src = html_escape(&photo.url);
        html.push_str(&format!(
            "<li><a href=\"{src}\">{name}</a><br/>\
             <img src=\"{src}\" alt=\"{name}\" width=\"240\"/></li>\n"
        ));
    }
    html.push_str("</ul>\n</body></html>\n");
    html
}

/// Inline error fragment with a link back to the gallery.
pub fn render_error(message: &str) -> String {
    format!(
        "<h1>Upload failed</h1>\n<p>{}</p>\n<p><a href=\"/\">Back to the gallery</a></p>\n",
        html_escape(message)
    )
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_gallery_still_has_the_form() {
        let html = render_index(&[]);
        assert!(html.contains(r#"name="form_file""#));
        assert!(html.contains("<ul>\n</ul>"));
    }

    #[test]
    fn each_photo_gets_a_list_item_with_an_image() {
        let html = render_index(&[
            Photo::new("cat.png", "https://h/b/cat.png"),
            Photo::new("dog.jpg", "https://h/b/dog.jpg"),
        ]);
        assert_eq!(html.matches("<li>").count(), 2);
        assert!(html.contains(r#"<img src="https://h/b/cat.png""#));
        assert!(html.contains(">dog.jpg</a>"));
    }

    #[test]
    fn markup_in_names_is_escaped() {
        let html = render_index(&[Photo::new("<b>\"x\".png", "u")]);
        assert!(html.contains("&lt;b&gt;&quot;x&quot;.png"));
        assert!(!html.contains("<b>"));
    }
}
