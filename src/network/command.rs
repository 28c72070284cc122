use crate::{
    store::{Coordinates, NewReview, NewVehicle},
    ParseError,
};

/// Команда строкового протокола, по одной на строку.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ping(Option<String>),
    Quit,
    /// Список всех сущностей
    Vehicles,
    Vehicle(String),
    AddVehicle(NewVehicle),
    Move {
        id: String,
        coordinates: Coordinates,
    },
    Reviews(String),
    AddReview(NewReview),
    /// Перевести соединение в режим подписки на тему
    Subscribe(String),
    /// Выйти из режима подписки
    Unsubscribe,
    /// Статистика реестра тем
    Stats,
}

impl Command {
    /// Разбирает строку команды. Имя команды нечувствительно к регистру.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut parts = line.split_whitespace();
        let name = parts.next().ok_or(ParseError::Empty)?.to_ascii_uppercase();
        let args: Vec<&str> = parts.collect();

        let cmd = match name.as_str() {
            "PING" => match args.as_slice() {
                [] => Command::Ping(None),
                [msg] => Command::Ping(Some(msg.to_string())),
                _ => return Err(ParseError::WrongArgCount("PING", "0 or 1")),
            },
            "QUIT" => {
                expect_args("QUIT", &args, 0, "0")?;
                Command::Quit
            }
            "VEHICLES" => {
                expect_args("VEHICLES", &args, 0, "0")?;
                Command::Vehicles
            }
            "VEHICLE" => {
                expect_args("VEHICLE", &args, 1, "1")?;
                Command::Vehicle(args[0].to_string())
            }
            "ADDVEHICLE" => {
                expect_args("ADDVEHICLE", &args, 3, "3")?;
                Command::AddVehicle(NewVehicle {
                    name: args[0].to_string(),
                    coordinates: parse_coordinates("ADDVEHICLE", args[1], args[2])?,
                })
            }
            "MOVE" => {
                expect_args("MOVE", &args, 3, "3")?;
                Command::Move {
                    id: args[0].to_string(),
                    coordinates: parse_coordinates("MOVE", args[1], args[2])?,
                }
            }
            "REVIEWS" => {
                expect_args("REVIEWS", &args, 1, "1")?;
                Command::Reviews(args[0].to_string())
            }
            "ADDREVIEW" => {
                if args.len() < 3 {
                    return Err(ParseError::WrongArgCount("ADDREVIEW", "at least 3"));
                }
                let rating = args[1]
                    .parse::<u8>()
                    .map_err(|_| ParseError::InvalidInteger("ADDREVIEW", args[1].to_string()))?;
                Command::AddReview(NewReview {
                    vehicle_id: args[0].to_string(),
                    rating,
                    comment: args[2..].join(" "),
                })
            }
            "SUBSCRIBE" => {
                expect_args("SUBSCRIBE", &args, 1, "1")?;
                Command::Subscribe(args[0].to_string())
            }
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "STATS" => Command::Stats,
            _ => return Err(ParseError::UnknownCommand(name)),
        };
        Ok(cmd)
    }
}

fn expect_args(
    command: &'static str,
    args: &[&str],
    count: usize,
    label: &'static str,
) -> Result<(), ParseError> {
    if args.len() != count {
        return Err(ParseError::WrongArgCount(command, label));
    }
    Ok(())
}

fn parse_coordinates(
    command: &'static str,
    latitude: &str,
    longitude: &str,
) -> Result<Coordinates, ParseError> {
    let parse = |s: &str| {
        s.parse::<f64>()
            .map_err(|_| ParseError::InvalidFloat(command, s.to_string()))
    };
    Ok(Coordinates::new(parse(latitude)?, parse(longitude)?))
}
