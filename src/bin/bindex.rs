use bindex::{default_service, Error, EvalError, Value};
use serde_json::json;
use std::time::Instant;

fn usage() -> ! {
    eprintln!("Usage: bindex \"expression\" [options] [name=value ...]");
    eprintln!("       bindex \"expression\" --json '{{\"name\": \"value\"}}'");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --json JSON      Use a JSON object as the evaluation context");
    eprintln!("  --output-json    Output result in JSON format with type and timing");
    eprintln!("  --info           Print the compiled expression's watch metadata");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  bindex \"1 + 2 * 3\"");
    eprintln!("  bindex \"user.name | uppercase\" --json '{{\"user\": {{\"name\": \"ada\"}}}}'");
    eprintln!("  bindex \"price * qty\" price=19.99 qty=3 --output-json");
    eprintln!("  bindex \"::items[0] + total\" --info");
    std::process::exit(1);
}

fn register_demo_filters() -> Result<(), Error> {
    let service = default_service();
    service.register_filter_fn("uppercase", |input, _| {
        Ok(Value::String(input.to_js_string().to_uppercase()))
    })?;
    service.register_filter_fn("lowercase", |input, _| {
        Ok(Value::String(input.to_js_string().to_lowercase()))
    })?;
    service.register_filter_fn("json", |input, _| {
        serde_json::to_string(&input.to_json())
            .map(Value::String)
            .map_err(|e| EvalError::host(e.to_string()))
    })?;
    Ok(())
}

/// `name=value`: values are read as JSON when possible, otherwise as plain strings.
fn parse_value(s: &str) -> Value {
    match serde_json::from_str::<serde_json::Value>(s) {
        Ok(json) => Value::from_json(json),
        Err(_) => Value::String(s.to_string()),
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        usage();
    }

    if let Err(e) = register_demo_filters() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let mut expr = "";
    let mut json_input = None;
    let mut output_json = false;
    let mut info = false;
    let mut vars = Vec::new();
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];
        if i == 0 {
            // First argument is always the expression
            expr = arg;
        } else if arg == "--json" {
            if i + 1 >= args.len() {
                eprintln!("Error: --json flag requires a JSON string argument");
                usage();
            }
            json_input = Some(args[i + 1].clone());
            i += 1;
        } else if arg == "--output-json" {
            output_json = true;
        } else if arg == "--info" {
            info = true;
        } else if let Some((name, value)) = arg.split_once('=') {
            vars.push((name.to_string(), parse_value(value)));
        } else {
            eprintln!("Invalid variable assignment: '{}'. Use format: name=value", arg);
            std::process::exit(1);
        }
        i += 1;
    }

    let context = match json_input {
        Some(json_str) => match serde_json::from_str::<serde_json::Value>(&json_str) {
            Ok(json @ serde_json::Value::Object(_)) => Value::from_json(json),
            Ok(_) => {
                eprintln!("Error: JSON context must be an object");
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("Error: Invalid JSON: {}", e);
                std::process::exit(1);
            }
        },
        None => Value::empty_object(),
    };
    for (name, value) in vars {
        if let Err(e) = context.set(&name, value) {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }

    let start_time = Instant::now();
    let compiled = match default_service().parse(expr) {
        Ok(compiled) => compiled,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };
    let result = compiled.evaluate(&context);
    let execution_time_ms = start_time.elapsed().as_secs_f64() * 1000.0;

    if info {
        let metadata = compiled.metadata();
        println!(
            "{}",
            serde_json::to_string_pretty(&metadata).unwrap_or_else(|_| "{}".to_string())
        );
    }

    match result {
        Ok(val) => {
            if output_json {
                println!("{}", format_json_output(&val, execution_time_ms));
            } else {
                println!("{}", val);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

fn format_json_output(value: &Value, execution_time_ms: f64) -> String {
    let output = json!({
        "result": value.to_json(),
        "type": value.type_name(),
        "execution_time": format!("{:.2} ms", execution_time_ms)
    });
    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}
