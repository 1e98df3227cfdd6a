use std::{
    fs,
    io::{BufRead, BufReader, Read, Write},
    net::TcpListener,
    thread::{self, JoinHandle},
};

use csv_sql_exporter::{
    ExportError,
    core::step::{Step, StepBuilder, StepExecution, StepStatus},
    tasklet::ftp::{FtpProtocol, FtpPutTaskletBuilder},
};

/// What the fake server saw during one session.
#[derive(Debug, Default)]
struct Session {
    commands: Vec<String>,
    stored_path: Option<String>,
    stored_bytes: Vec<u8>,
}

/// Serves a single passive mode session on localhost and records it.
fn spawn_fake_ftp_server() -> (u16, JoinHandle<Session>) {
    let control = TcpListener::bind("127.0.0.1:0").expect("control listener");
    let port = control.local_addr().expect("control address").port();

    let handle = thread::spawn(move || {
        let (stream, _) = control.accept().expect("control connection");
        let mut writer = stream.try_clone().expect("control writer");
        let mut reader = BufReader::new(stream);
        let mut session = Session::default();
        let mut data: Option<TcpListener> = None;

        writer.write_all(b"220 fake server ready\r\n").unwrap();

        let mut line = String::new();
        while reader.read_line(&mut line).unwrap_or(0) > 0 {
            let command = line.trim_end().to_string();
            line.clear();
            session.commands.push(command.clone());

            let (verb, argument) = command.split_once(' ').unwrap_or((command.as_str(), ""));
            match verb.to_ascii_uppercase().as_str() {
                "USER" => writer.write_all(b"331 password please\r\n").unwrap(),
                "PASS" => writer.write_all(b"230 logged in\r\n").unwrap(),
                "TYPE" => writer.write_all(b"200 type set\r\n").unwrap(),
                "PASV" => {
                    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
                    let data_port = listener.local_addr().unwrap().port();
                    data = Some(listener);
                    let reply = format!(
                        "227 Entering Passive Mode (127,0,0,1,{},{})\r\n",
                        data_port / 256,
                        data_port % 256
                    );
                    writer.write_all(reply.as_bytes()).unwrap();
                }
                "STOR" => {
                    writer.write_all(b"150 opening data connection\r\n").unwrap();
                    let listener = data.take().expect("PASV before STOR");
                    let (mut data_stream, _) = listener.accept().unwrap();
                    data_stream.read_to_end(&mut session.stored_bytes).unwrap();
                    session.stored_path = Some(argument.to_string());
                    writer.write_all(b"226 transfer complete\r\n").unwrap();
                }
                "QUIT" => {
                    writer.write_all(b"221 bye\r\n").unwrap();
                    break;
                }
                _ => writer.write_all(b"502 not implemented\r\n").unwrap(),
            }
        }

        session
    });

    (port, handle)
}

fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener");
    listener.local_addr().expect("address").port()
}

#[test]
fn upload_exported_file_over_ftp() -> Result<(), ExportError> {
    let folder = tempfile::tempdir()?;
    let local_file = folder.path().join("people.csv");
    fs::write(&local_file, "ID,Name\n1,Alice\n2,Bob\n")?;

    let (port, server) = spawn_fake_ftp_server();

    let tasklet = FtpPutTaskletBuilder::new()
        .host("127.0.0.1")
        .port(port)
        .username("exporter")
        .password("secret")
        .protocol(FtpProtocol::Ftp)
        .local_file(&local_file)
        .remote_folder("/incoming")
        .build()?;

    let step = StepBuilder::new("upload").tasklet(&tasklet).build()?;
    let mut step_execution = StepExecution::new(step.get_name());
    step.execute(&mut step_execution)?;

    assert_eq!(step_execution.status, StepStatus::Success);

    let session = server.join().expect("fake server thread");
    assert_eq!(session.commands[0], "USER exporter");
    assert_eq!(session.commands[1], "PASS secret");
    assert!(session.commands.iter().any(|command| command == "TYPE I"));
    assert_eq!(session.stored_path.as_deref(), Some("/incoming/people.csv"));
    assert_eq!(session.stored_bytes, b"ID,Name\n1,Alice\n2,Bob\n");
    Ok(())
}

#[test]
fn unreachable_server_fails_the_step() -> Result<(), ExportError> {
    let folder = tempfile::tempdir()?;
    let local_file = folder.path().join("people.csv");
    fs::write(&local_file, "ID\n1\n")?;

    let tasklet = FtpPutTaskletBuilder::new()
        .host("127.0.0.1")
        .port(unused_port())
        .username("exporter")
        .password("secret")
        .local_file(&local_file)
        .build()?;

    let step = StepBuilder::new("upload").tasklet(&tasklet).build()?;
    let mut step_execution = StepExecution::new(step.get_name());
    let result = step.execute(&mut step_execution);

    assert!(matches!(result, Err(ExportError::Transfer(_))));
    assert_eq!(step_execution.status, StepStatus::Failed);
    Ok(())
}

#[test]
fn missing_local_file_is_reported_before_connecting() -> Result<(), ExportError> {
    let folder = tempfile::tempdir()?;
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();

    let tasklet = FtpPutTaskletBuilder::new()
        .host("127.0.0.1")
        .port(port)
        .username("exporter")
        .password("secret")
        .local_file(folder.path().join("never-written.csv"))
        .build()?;

    let step = StepBuilder::new("upload").tasklet(&tasklet).build()?;
    let mut step_execution = StepExecution::new(step.get_name());
    let result = step.execute(&mut step_execution);

    assert!(matches!(result, Err(ExportError::Configuration(_))));
    listener.set_nonblocking(true)?;
    assert!(listener.accept().is_err());
    Ok(())
}

#[test]
fn ssh_based_protocols_are_rejected() {
    for protocol in ["SFTP", "scp"] {
        assert!(matches!(
            protocol.parse::<FtpProtocol>(),
            Err(ExportError::Configuration(_))
        ));
    }
}
