//! Prompt builders for the three generation operations
//!
//! Attachments are inlined as fenced blocks under their file name so the
//! model can use their content as the brief requires.

use crate::attachments::DecodedAttachment;

fn push_attachments(prompt: &mut String, attachments: &[DecodedAttachment]) {
    for attachment in attachments {
        prompt.push_str(&format!(
            "\n**Attachment: `{}`**\n```\n{}\n```\n",
            attachment.name, attachment.content
        ));
    }
}

/// Prompt for a brand-new single-page application
pub fn markup_prompt(brief: &str, attachments: &[DecodedAttachment]) -> String {
    let mut prompt = String::new();

    prompt.push_str(
        "You are an expert web developer. Your task is to create a complete, \
         single-page web application in one HTML file.\n\
         All CSS and JavaScript must be inline.\n\n",
    );

    prompt.push_str("**Project Brief:**\n");
    prompt.push_str(brief);
    prompt.push('\n');
    push_attachments(&mut prompt, attachments);

    prompt.push_str("\n**Instructions:**\n");
    prompt.push_str("- Use the content from attachments as required by the brief.\n");
    prompt.push_str(
        "- Respond with ONLY the raw HTML code. Do not include any explanations or markdown.\n",
    );
    prompt
}

/// Prompt for the repository's README
pub fn description_prompt(brief: &str, repo_name: &str) -> String {
    format!(
        "You are a technical writer. Create a professional README.md file for a web application.\n\n\
         **Application Name:** `{}`\n\
         **Brief:** {}\n\n\
         **Instructions:**\n\
         - Create a markdown file with sections: Title, Summary, Usage, and License (MIT).\n\
         - Respond with ONLY the raw markdown content.\n",
        repo_name, brief
    )
}

/// Prompt for revising an existing page
pub fn revision_prompt(existing: &str, brief: &str, attachments: &[DecodedAttachment]) -> String {
    let mut prompt = String::new();

    prompt.push_str("You are an expert web developer updating an existing web page.\n\n");
    prompt.push_str("**Current HTML code:**\n```html\n");
    prompt.push_str(existing);
    prompt.push_str("\n```\n\n");

    prompt.push_str("**Modify the code for this change request:**\n");
    prompt.push_str(brief);
    prompt.push('\n');
    push_attachments(&mut prompt, attachments);

    prompt.push_str("\n**Instructions:**\n");
    prompt.push_str("- Keep existing behaviour that the change request does not mention.\n");
    prompt.push_str("- Respond with ONLY the new, complete HTML code.\n");
    prompt
}
