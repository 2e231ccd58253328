use super::parser::{parse_markdown_table, TablePolicy};
use super::types::{ChatMessage, Conversation};

pub const PARTICIPANTS_SYSTEM_PROMPT: &str = "You are a process modelling expert.";

pub const PROCESS_TABLE_SYSTEM_PROMPT: &str = "You are an expert in BPMN 2.0 process modelling.";

/// Worked example pinning the output format of the process-table stage.
/// Sent to the model verbatim, never parsed.
const PROCESS_TABLE_EXAMPLE: &str = "\
| Object Type         | Object Name                           | Predecessor                           | Successor                                                               | Input Data                                    | Output Data                                  | Additional Information                                                |
| ------------------- | ------------------------------------- | ------------------------------------- | ----------------------------------------------------------------------- | --------------------------------------------- | -------------------------------------------- | --------------------------------------------------------------------- |
• Start Event         | Start Condition                       | N/A                                   | Name of next Object                                                     | N/A                                           | N/A                                          |                                                                       |
• Receive Task        | Task X (where a message is recieved)  |                                       | Name of next Object                                                     |                                               | Name of Data Object 1; Name of Data Object 2 |                                                                       |
• Gateway (Exclusive) | Condition for splitting sequence flow |                                       | Name of next Object (Condition 1) OR Name of next Object (Condition 2)  |                                               |                                              |                                                                       |
• Send Task           | Task Y (where a message is sent)      | Only Object Name of Exclusive Gateway |                                                                         | Name of Data Object 1                         | Name of Data Object 3                        |                                                                       |
• Task                | Task Z                                | Only Object Name of Exclusive Gateway |                                                                         | Name of Data Object 1                         | Name of Data Object 4                        | Additional information if any (special conditions, constraints, etc.) |
• Gateway (Parallel)  | Parallel Gateway name                 |                                       | Name of Successor 1 AND Name of Successor 2.                            |                                               |                                              |                                                                       |
• Task                | Task A                                | Only Object Name of Parallel Gateway  |                                                                         |                                               |                                              |                                                                       |
• Task                | Task B                                | Only Object name of Parallel Gateway  |                                                                         | Name of Data Object 2; Name of Data Object 3  |                                              |                                                                       |
• Intermediate Event  | Event Name                            | Task B                                | Task C                                                                  | N/A                                           | N/A                                          |                                                                       |
• Task                | Task C                                | Event Name                            | End Condition                                                           | Name of Data Object 2                         |                                              |                                                                       |
• End Event           | End Condition                         |                                       | N/A                                                                     | N/A                                           | N/A                                          |                                                                       |
";

pub const MESSAGE_FLOW_SYSTEM_PROMPT: &str = "\
You are a process modeling expert trying to understand interactions between participants. \
Given below are markdown tables which specify the send and receive tasks as well as the associated data for each participant.\
Analyze all the participant\u{2019}s sending and receiving tasks to identify all the message flows between them.\
Return a single Markdown table with exactly these columns:

| Message Sent             | Sending Task            | Sending Participant          | Receiving Task          | Receiving Participant         |
| ------------------------ | ----------------------- | ---------------------------- | ----------------------- | ----------------------------- |
| Name of Message Sent     | Name of Send Task       | Name of Sending Participant  | Name of Receive Task    | Name of Receiving Participant |

Only list Send \u{2192} Receive flows that logically belong together.";

/// Wrap document text in a literal block so the model treats it as data.
fn fenced(document_text: &str) -> String {
    format!("```\n{document_text}\n```")
}

/// Stage 1: ask for the participants of the procedure as a flat numbered list.
pub fn build_participants_prompt(document_text: &str) -> Conversation {
    let user = format!(
        "Identify the main participants that execute the processes mentioned the Standard Operating Procedure given below.\n\
         Return a simple, single-level numbered list (e.g. \u{201C}1. Alice\u{201D}, \u{201C}2. Bob\u{201D}), with no extra text \
         using only alphanumeric characters and spaces (no special characters):\n\n{}",
        fenced(document_text)
    );

    Conversation::new(vec![
        ChatMessage::system(PARTICIPANTS_SYSTEM_PROMPT),
        ChatMessage::user(user),
    ])
}

/// Stage 2: ask the model, acting as `participant`, for its process table.
pub fn build_process_table_prompt(participant: &str, document_text: &str) -> Conversation {
    let user = format!(
        "As the participant **{participant}** trying to understand what you need to do within this standard operating \
         procedure and how you collaborate with the other participants based on the Standard Operating Procedure given below. \
         Create a single Formalised Process Data table using the BPMN 2.0 Standard relating to all processes that you \
         participate in, ensuring that all steps are represented.\
         The tasks must fit within a single swim lane with a single start event.\
         The result must be given in Markdown format, as a table with exactly these columns(nothing additional):\n\n\
         {PROCESS_TABLE_EXAMPLE}\n\
         Use **only** these column headers and rows that reflect your own processes \u{2013} no extra section headings, \
         labels or comments.  \n\n{}",
        fenced(document_text)
    );

    Conversation::new(vec![
        ChatMessage::system(PROCESS_TABLE_SYSTEM_PROMPT),
        ChatMessage::user(user),
    ])
}

/// Stage 3: ask for every send → receive pairing across the retained tables.
///
/// Each participant contributes its full reply text, in the given order.
pub fn build_message_flow_prompt<P, T>(tables: &[(P, T)]) -> Conversation
where
    P: AsRef<str>,
    T: AsRef<str>,
{
    let user = tables
        .iter()
        .map(|(participant, table)| {
            format!("Tasks for {}:\n\n{}\n", participant.as_ref(), table.as_ref())
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    Conversation::new(vec![
        ChatMessage::system(MESSAGE_FLOW_SYSTEM_PROMPT),
        ChatMessage::user(user),
    ])
}

/// Condense a process table to its send and receive tasks.
///
/// Not part of any conversation: the message-flow stage sends full tables.
/// Written to the raw dump so an operator can check which tasks the model
/// had to pair up.
pub fn summarize_send_receive_tasks(table_markdown: &str) -> String {
    let records =
        parse_markdown_table(table_markdown, TablePolicy::Lenient, &[]).unwrap_or_default();

    let mut out = String::from(
        "| Task Type | Task Name | Output Data | Input Data |\n\
         | --------- | --------- | ----------- | ---------- |\n",
    );

    let cell = |record: &super::types::Record, column: &str| -> String {
        record
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .unwrap_or("\u{2014}")
            .to_string()
    };

    for record in records.iter().filter(|r| {
        matches!(
            r.get("Object Type").map(String::as_str),
            Some("Send Task") | Some("Receive Task")
        )
    }) {
        let task_type = record.get("Object Type").map(|v| v.trim()).unwrap_or_default();
        let task_name = record.get("Object Name").map(|v| v.trim()).unwrap_or_default();
        out.push_str(&format!(
            "| {task_type} | {task_name} | {} | {} |\n",
            cell(record, "Output Data"),
            cell(record, "Input Data")
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::structuring::types::Role;

    #[test]
    fn participants_prompt_embeds_document_in_fence() {
        let conv = build_participants_prompt("Clerk files the form.");
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[0].role, Role::System);
        assert_eq!(conv.messages[1].role, Role::User);

        let user = conv.user_prompt().unwrap();
        assert!(user.contains("numbered list"));
        assert!(user.contains("alphanumeric characters and spaces"));
        assert!(user.ends_with("```\nClerk files the form.\n```"));
    }

    #[test]
    fn process_table_prompt_names_participant_and_columns() {
        let conv = build_process_table_prompt("Quality Manager", "SOP body");
        assert_eq!(conv.system_prompt(), Some(PROCESS_TABLE_SYSTEM_PROMPT));

        let user = conv.user_prompt().unwrap();
        assert!(user.contains("**Quality Manager**"));
        assert!(user.contains("single swim lane with a single start event"));
        for column in crate::pipeline::structuring::types::PROCESS_COLUMNS {
            assert!(user.contains(column), "missing column {column}");
        }
        assert!(user.ends_with("```\nSOP body\n```"));
    }

    #[test]
    fn document_text_is_verbatim() {
        let text = "Line with | pipes |\n  indented {braces} and \"quotes\"";
        let conv = build_process_table_prompt("A", text);
        assert!(conv.user_prompt().unwrap().contains(text));
    }

    #[test]
    fn message_flow_prompt_keeps_order_and_full_tables() {
        let tables = vec![
            ("Bob", "| Object Type | Object Name |\n|---|---|\n| Send Task | Send invoice |"),
            ("Alice", "| Object Type | Object Name |\n|---|---|\n| Receive Task | Get invoice |"),
        ];
        let conv = build_message_flow_prompt(&tables);
        let user = conv.user_prompt().unwrap();

        let bob = user.find("Tasks for Bob:").unwrap();
        let alice = user.find("Tasks for Alice:").unwrap();
        assert!(bob < alice);
        assert!(user.contains(tables[0].1));
        assert!(user.contains(tables[1].1));
        assert_eq!(
            user,
            format!(
                "Tasks for Bob:\n\n{}\n\n\nTasks for Alice:\n\n{}\n",
                tables[0].1, tables[1].1
            )
        );
    }

    #[test]
    fn message_flow_system_prompt_lists_columns() {
        let conv = build_message_flow_prompt::<&str, &str>(&[]);
        let system = conv.system_prompt().unwrap();
        for column in crate::pipeline::structuring::types::MESSAGE_FLOW_COLUMNS {
            assert!(system.contains(column));
        }
        assert_eq!(conv.user_prompt(), Some(""));
    }

    #[test]
    fn builders_are_deterministic() {
        assert_eq!(build_participants_prompt("x"), build_participants_prompt("x"));
        assert_eq!(
            build_process_table_prompt("p", "x"),
            build_process_table_prompt("p", "x")
        );
    }

    #[test]
    fn send_receive_summary_keeps_only_messaging_tasks() {
        let table = "| Object Type | Object Name | Input Data | Output Data |\n\
                     |---|---|---|---|\n\
                     | Start Event | Begin | N/A | N/A |\n\
                     | Send Task | Send report | Report | |\n\
                     | Task | Review | Report | Notes |\n\
                     | Receive Task | Get approval | | Approval |";
        let summary = summarize_send_receive_tasks(table);
        let lines: Vec<&str> = summary.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "| Task Type | Task Name | Output Data | Input Data |");
        assert_eq!(lines[2], "| Send Task | Send report | \u{2014} | Report |");
        assert_eq!(lines[3], "| Receive Task | Get approval | Approval | \u{2014} |");
    }

    #[test]
    fn send_receive_summary_of_unparsable_reply_is_header_only() {
        assert_eq!(summarize_send_receive_tasks("no table").lines().count(), 2);
    }
}
