use serde_json::Value;

pub const EXECUTION_DIGEST_SYSTEM: &str = "You are an experienced security analyst. \
You extract the key facts from playbook and operator execution results and restate them \
as concise, human-readable text. Do not comment or conclude; keep only objective results.";

pub const ROUND_REPORT_SYSTEM: &str = "You are an experienced security analyst who reports \
on security incidents. Produce a complete, factual report of the incident round from the \
information provided.";

/// Temperature for both digests.
pub const DIGEST_TEMPERATURE: f32 = 0.3;

pub const EXECUTION_DIGEST_NOTICE: &str =
    "Requesting an execution result digest from the narrator, please wait...";
pub const ROUND_REPORT_NOTICE: &str =
    "Requesting the round report from the narrator, please wait...";

fn fenced(context: &Value) -> String {
    let json = serde_json::to_string_pretty(context).unwrap_or_else(|_| context.to_string());
    format!("```json\n{}\n```\n", json)
}

pub fn execution_digest_prompt(context: &Value) -> String {
    let mut prompt = fenced(context);
    prompt.push_str(
        "\nAbove is the result of a command run for a planned task, either by an automated \
playbook or by an engineer working by hand.\n\
Extract the key information and keep the objective results; do not summarize or comment.\n\
Simply put: say what was run and what came back, without altering or inventing anything.\n",
    );
    prompt
}

pub fn round_report_prompt(context: &Value, has_previous: bool, manually_resolved: bool) -> String {
    let mut prompt = fenced(context);
    prompt.push_str(
        "\nFrom the incident information above, write a round status report the incident \
lead can base the next decision on:\n\
1. Recap the tasks that were planned for this incident.\n\
2. State how each task finally turned out.\n\
3. Report objective facts only. Do not alter or invent anything.\n\
4. Do not analyse; the incident lead does that.\n",
    );

    if has_previous {
        prompt.push_str(
            "\nThe previous round report is included as `previous_summary`. Update and extend it so that \
the new report:\n\
1. keeps the important information of the previous report,\n\
2. adds the newly found information,\n\
3. corrects earlier content where needed,\n\
4. reads as one complete and coherent report.\n",
        );
    }

    if manually_resolved {
        prompt.push_str(
            "\nYour output MUST be a single JSON object of this shape:\n\
```json\n\
{\n\
  \"from\": \"_expert\",\n\
  \"type\": \"llm_response\",\n\
  \"response_type\": \"event_summary\",\n\
  \"event_id\": \"event id, copied from the request\",\n\
  \"event_name\": \"event name, copied from the request\",\n\
  \"round_id\": \"round, copied from the request\",\n\
  \"summary\": \"the incident report\",\n\
  \"req_id\": \"copied from the request\",\n\
  \"res_id\": \"copied from the request\"\n\
}\n\
```\n\
This incident has been manually marked as resolved. Reflect that in the report.\n",
        );
    }

    prompt
}
