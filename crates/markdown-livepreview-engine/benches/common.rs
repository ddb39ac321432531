// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
#[allow(dead_code)]
pub fn generate_markdown_content(size: usize) -> String {
    let base = "# Title\n\n## Section\n\nParagraph with $x^2$ and *some* content :rocket:.\n\n- [x] Done\n- [ ] Todo\n\n```rust\nfn example() {\n    println!(\"Hello\");\n}\n```\n\n$$\n\\frac{a}{b}\n$$\n\n";
    base.repeat(size)
}

#[allow(dead_code)]
pub fn generate_document_with_toc(sections: usize) -> String {
    let mut content = String::from("[TOC]\n\n");
    for section in 0..sections {
        content.push_str(&format!("# Section {section}\n\n"));
        content.push_str("Some paragraph content with a footnote[^n].\n\n");
        content.push_str(&format!("## Detail {section}\n\n"));
        content.push_str("```mermaid\ngraph TD\n  A-->B\n```\n\n");
    }
    content.push_str("[^n]: The note.\n");
    content
}
